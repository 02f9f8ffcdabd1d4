use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;

use stampede::api::codec;
use stampede::api::event::{EventKind, GameMessage, Player, PlayerHello, PlayerHelloConfirm, PlayerMoved, PlayerQuit};
use stampede::server::config::ServerConfig;
use stampede::server::net::{PeerSink, SinkCommand};
use stampede::server::store::PlayerStore;
use stampede::server::tick::Simulation;
use stampede::server::{ClientMessage, Event};

const DELTA: f64 = 1.0 / 30.0;

struct Harness {
    sim: Simulation,
    queue: async_channel::Sender<Event>,
    store: Arc<PlayerStore>,
}

fn harness() -> Harness {
    let config = ServerConfig::default();
    let store = Arc::new(PlayerStore::default());
    let (queue, events) = async_channel::bounded(config.queue_capacity);
    let sim = Simulation::new(config, Arc::clone(&store), events);

    Harness { sim, queue, store }
}

struct Peer {
    sink: PeerSink,
    outbound: UnboundedReceiver<SinkCommand>,
}

fn peer() -> Peer {
    let (sink, outbound) = PeerSink::new();
    Peer { sink, outbound }
}

impl Peer {
    fn frames(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Ok(command) = self.outbound.try_recv() {
            if let SinkCommand::Frame(frame) = command {
                frames.push(frame);
            }
        }
        frames
    }

    fn was_closed(&mut self) -> bool {
        while let Ok(command) = self.outbound.try_recv() {
            if matches!(command, SinkCommand::Close) {
                return true;
            }
        }
        false
    }
}

fn hello_event(player_id: i32, peer: &Peer) -> Event {
    Event {
        player_id,
        sink: peer.sink.clone(),
        message: ClientMessage::Hello(PlayerHello { id: player_id }),
    }
}

fn confirm_event(player_id: i32, peer: &Peer) -> Event {
    Event {
        player_id,
        sink: peer.sink.clone(),
        message: ClientMessage::HelloConfirm(PlayerHelloConfirm { id: player_id }),
    }
}

fn quit_event(player_id: i32, peer: &Peer) -> Event {
    Event {
        player_id,
        sink: peer.sink.clone(),
        message: ClientMessage::Quit(PlayerQuit { id: player_id }),
    }
}

fn moved_event(player_id: i32, peer: &Peer, player: Player) -> Event {
    Event {
        player_id,
        sink: peer.sink.clone(),
        message: ClientMessage::Moved(PlayerMoved { player }),
    }
}

fn decode_batch(frame: &[u8]) -> Vec<GameMessage> {
    let (kind, message) = codec::parse_event_bytes(frame).unwrap();
    assert_eq!(kind, EventKind::EventList, "batches are always EventLists");
    let GameMessage::EventList(list) = message else {
        unreachable!();
    };
    list.events
        .iter()
        .map(|raw| codec::parse_event_bytes(raw).unwrap().1)
        .collect()
}

async fn connect(h: &mut Harness, id: i32, peer: &mut Peer) {
    h.queue.send(hello_event(id, peer)).await.unwrap();
    h.sim.step(DELTA);
    h.queue.send(confirm_event(id, peer)).await.unwrap();
    h.sim.step(DELTA);
    let _ = peer.frames();
}

fn place(h: &Harness, id: i32, x: f64, y: f64) {
    let mut record = h.store.get(id).unwrap();
    record.player.x = x;
    record.player.y = y;
    h.store.set(id, record);
}

#[tokio::test]
async fn hello_round_trip() {
    let mut h = harness();
    let mut a = peer();

    h.queue.send(hello_event(1, &a)).await.unwrap();
    h.sim.step(DELTA);

    // The very first frame is a bare hello, not a batch.
    let frames = a.frames();
    assert_eq!(frames.len(), 1);
    let (kind, message) = codec::parse_event_bytes(&frames[0]).unwrap();
    assert_eq!(kind, EventKind::PlayerHello);
    assert_eq!(
        message,
        GameMessage::PlayerHello(PlayerHello { id: 1 })
    );

    // Spawn randomness lands in the documented ranges.
    let spawned = h.store.get(1).unwrap().player;
    assert!(spawned.speed >= 200.0 && spawned.speed < 300.0);
    assert!(spawned.x >= 800.0 && spawned.x < 1200.0);
    assert!(spawned.y >= 600.0 && spawned.y < 900.0);

    h.queue.send(confirm_event(1, &a)).await.unwrap();
    h.sim.step(DELTA);

    // Alone in the world: no PlayerJoined entries, only the join broadcast.
    let frames = a.frames();
    assert_eq!(frames.len(), 1);
    let batch = decode_batch(&frames[0]);
    assert!(
        batch
            .iter()
            .all(|event| !matches!(event, GameMessage::PlayerJoined(_)))
    );
}

#[tokio::test]
async fn join_visibility() {
    let mut h = harness();
    let mut a = peer();
    let mut b = peer();

    connect(&mut h, 1, &mut a).await;

    h.queue.send(hello_event(2, &b)).await.unwrap();
    h.sim.step(DELTA);
    h.queue.send(confirm_event(2, &b)).await.unwrap();
    h.sim.step(DELTA);

    // A learns about B through the broadcast list, which carries the
    // newcomer twice.
    let a_frames = a.frames();
    assert_eq!(a_frames.len(), 1);
    let a_batch = decode_batch(&a_frames[0]);
    let joined_lists: Vec<_> = a_batch
        .iter()
        .filter_map(|event| match event {
            GameMessage::PlayerJoinedList(list) => Some(list),
            _ => None,
        })
        .collect();
    assert_eq!(joined_lists.len(), 1);
    let ids: Vec<i32> = joined_lists[0].players.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 2]);

    // B gets A's cached snapshot as a targeted event, before broadcasts.
    let b_frames = b.frames();
    let b_batch = decode_batch(b_frames.last().unwrap());
    let GameMessage::PlayerJoined(first) = &b_batch[0] else {
        panic!("expected a targeted PlayerJoined first, got {:?}", b_batch[0]);
    };
    assert_eq!(first.player.id, 1);
}

#[tokio::test]
async fn move_authority() {
    let mut h = harness();
    let mut a = peer();

    connect(&mut h, 1, &mut a).await;
    place(&h, 1, 100.0, 100.0);

    // The client claims a bogus position; only its intent is taken.
    let claimed = Player {
        id: 1,
        x: 9999.0,
        y: 9999.0,
        moving_right: true,
        ..Player::default()
    };
    h.queue.send(moved_event(1, &a, claimed)).await.unwrap();
    h.sim.step(DELTA);

    let frames = a.frames();
    assert_eq!(frames.len(), 1);
    let batch = decode_batch(&frames[0]);
    let GameMessage::PlayerMovedList(list) = &batch[0] else {
        panic!("expected PlayerMovedList, got {:?}", batch[0]);
    };
    assert_eq!(list.players.len(), 1);
    assert_eq!(list.players[0].id, 1);
    assert_eq!(list.players[0].x, 100.0);
    assert_eq!(list.players[0].y, 100.0);
    assert!(list.players[0].moving_right);
}

#[tokio::test]
async fn batches_carry_at_most_one_moved_list() {
    let mut h = harness();
    let mut a = peer();
    let mut b = peer();

    connect(&mut h, 1, &mut a).await;
    connect(&mut h, 2, &mut b).await;

    let intent = |right| Player {
        id: 1,
        moving_right: right,
        ..Player::default()
    };
    h.queue.send(moved_event(1, &a, intent(true))).await.unwrap();
    h.queue.send(moved_event(1, &a, intent(false))).await.unwrap();
    h.sim.step(DELTA);

    let frames = b.frames();
    assert_eq!(frames.len(), 1);
    let batch = decode_batch(&frames[0]);

    let moved_lists: Vec<_> = batch
        .iter()
        .filter_map(|event| match event {
            GameMessage::PlayerMovedList(list) => Some(list),
            _ => None,
        })
        .collect();
    assert_eq!(moved_lists.len(), 1);
    // Both intents from the tick are coalesced into the one list.
    assert_eq!(moved_lists[0].players.len(), 2);
}

#[tokio::test]
async fn cheat_detection_closes_only_the_offender() {
    let mut h = harness();
    let mut a = peer();
    let mut b = peer();

    connect(&mut h, 1, &mut a).await;
    connect(&mut h, 2, &mut b).await;

    // A claims to be B.
    let forged = Player {
        id: 2,
        moving_left: true,
        ..Player::default()
    };
    h.queue.send(moved_event(1, &a, forged)).await.unwrap();
    h.sim.step(DELTA);

    assert!(a.was_closed());
    assert!(!b.was_closed());
    // B's movement flags were not touched.
    assert!(!h.store.get(2).unwrap().player.moving_left);
}

#[tokio::test]
async fn boundary_clamp_is_per_axis() {
    let mut h = harness();
    let mut a = peer();

    connect(&mut h, 1, &mut a).await;

    let mut record = h.store.get(1).unwrap();
    record.player.x = 0.0;
    record.player.y = 50.0;
    record.player.speed = 300.0;
    record.player.moving_left = true;
    record.player.moving_up = true;
    h.store.set(1, record);

    h.sim.integrate(DELTA);

    let player = h.store.get(1).unwrap().player;
    assert_eq!(player.x, 0.0);
    assert!((player.y - 40.0).abs() < 1e-9);
}

#[tokio::test]
async fn all_four_flags_move_diagonally() {
    let mut h = harness();
    let mut a = peer();

    connect(&mut h, 1, &mut a).await;

    let mut record = h.store.get(1).unwrap();
    record.player.x = 400.0;
    record.player.y = 300.0;
    record.player.speed = 300.0;
    record.player.moving_left = true;
    record.player.moving_right = true;
    record.player.moving_up = true;
    record.player.moving_down = true;
    h.store.set(1, record);

    h.sim.integrate(DELTA);

    // Both directions active on each axis: the moves cancel out.
    let player = h.store.get(1).unwrap().player;
    assert!((player.x - 400.0).abs() < 1e-9);
    assert!((player.y - 300.0).abs() < 1e-9);

    // In the corner the inward moves survive and the outward ones are
    // suppressed, so the player slides diagonally.
    place(&h, 1, 0.0, 0.0);
    h.sim.integrate(DELTA);

    let player = h.store.get(1).unwrap().player;
    assert!(player.x > 0.0);
    assert!(player.y > 0.0);
}

#[tokio::test]
async fn quit_propagation() {
    let mut h = harness();
    let mut a = peer();
    let mut b = peer();

    connect(&mut h, 1, &mut a).await;
    connect(&mut h, 2, &mut b).await;

    h.queue.send(quit_event(1, &a)).await.unwrap();
    h.sim.step(DELTA);

    let frames = b.frames();
    assert_eq!(frames.len(), 1);
    let batch = decode_batch(&frames[0]);
    assert!(
        batch
            .iter()
            .any(|event| *event == GameMessage::PlayerQuit(PlayerQuit { id: 1 }))
    );
    assert!(h.store.get(1).is_none());

    // Later ticks never mention the quitter again.
    h.sim.step(DELTA);
    assert!(b.frames().is_empty());
}

#[tokio::test]
async fn world_never_leaks_out_of_bounds() {
    let mut h = harness();
    let mut a = peer();

    connect(&mut h, 1, &mut a).await;

    let mut record = h.store.get(1).unwrap();
    record.player.x = 400.0;
    record.player.y = 300.0;
    record.player.speed = 299.0;
    record.player.moving_right = true;
    record.player.moving_down = true;
    h.store.set(1, record);

    // Long enough to march into the far corner and press against it.
    for _ in 0..600 {
        h.sim.integrate(DELTA);

        let player = h.store.get(1).unwrap().player;
        assert!(player.x >= 0.0 && player.x < 1600.0);
        assert!(player.y >= 0.0 && player.y < 1200.0);
    }
}
