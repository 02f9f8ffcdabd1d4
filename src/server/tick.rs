use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::api::{
    codec,
    event::{EventHolder, EventKind, Player, PlayerHello, PlayerHelloConfirm, PlayerMoved, PlayerQuit},
};
use crate::server::{
    ClientMessage, Event,
    cache::FlatCache,
    collector::EventCollector,
    config::ServerConfig,
    error::ServerError,
    pool::BuilderPool,
    stats::StatCollector,
    store::{PlayerStore, PlayerWithSocket},
};

const POOL_BLOCK_SIZE: usize = 512;
const POOL_INITIAL_CAPACITY: usize = 4;

/// The authoritative simulation. A single task owns it; everything it
/// touches besides the player store is single-writer by construction.
pub struct Simulation {
    config: ServerConfig,
    store: Arc<PlayerStore>,
    events: async_channel::Receiver<Event>,
    collector: EventCollector,
    cache: FlatCache,
    pool: BuilderPool,
    stats: StatCollector,
    moved_list: Vec<Player>,
    joined_list: Vec<Player>,
}

impl Simulation {
    pub fn new(
        config: ServerConfig,
        store: Arc<PlayerStore>,
        events: async_channel::Receiver<Event>,
    ) -> Self {
        let window = config.tick_rate as usize;

        Self {
            config,
            store,
            events,
            collector: EventCollector::default(),
            cache: FlatCache::default(),
            pool: BuilderPool::new(POOL_BLOCK_SIZE, POOL_INITIAL_CAPACITY),
            stats: StatCollector::new(window),
            moved_list: Vec::new(),
            joined_list: Vec::new(),
        }
    }

    pub async fn run(mut self) {
        let period = Duration::from_secs(1) / self.config.tick_rate;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut previous_time = Instant::now();

        loop {
            ticker.tick().await;
            let start_tick = Instant::now();

            let delta = start_tick - previous_time;
            previous_time = start_tick;

            self.step(delta.as_secs_f64());

            self.stats.tick().add_time(start_tick.elapsed().as_secs_f64());
            self.stats.finish_tick();

            if let Some(avg) = self.stats.average_if_ready() {
                log::debug!(
                    "tick: {:.6}s avg-events: {:.3} avg-data-sent-per-player: {:.3}KB peak-message: {:.0}B players: {:.1}",
                    avg.avg_tick_processing_time,
                    avg.avg_events_recv_per_tick,
                    avg.avg_data_sent_per_player / 1024.0,
                    avg.max_message_size,
                    avg.avg_active_players,
                );
                self.stats.reset_frame();
            }
        }
    }

    /// One authoritative step: drain, coalesce, dispatch, reset, integrate.
    pub fn step(&mut self, delta_secs: f64) {
        self.process_events();
        self.flush_pending();
        self.dispatch();
        self.reset();
        self.integrate(delta_secs);
    }

    /// Drains exactly the queue's current depth; never blocks mid-tick.
    pub fn process_events(&mut self) {
        let pending = self.events.len();
        self.stats.tick().add_events_received(pending);

        for _ in 0..pending {
            let Ok(event) = self.events.try_recv() else {
                break;
            };
            self.apply(event);
        }
    }

    fn apply(&mut self, event: Event) {
        match event.message {
            ClientMessage::Hello(hello) => self.on_hello(&event, hello),
            ClientMessage::HelloConfirm(confirm) => self.on_hello_confirm(&event, confirm),
            ClientMessage::Quit(quit) => self.on_quit(&event, quit),
            ClientMessage::Moved(moved) => self.on_moved(&event, moved),
        }
    }

    fn on_hello(&mut self, event: &Event, hello: PlayerHello) {
        if hello.id != event.player_id {
            self.close_cheater(event, hello.id);
            return;
        }

        let mut rng = rand::rng();
        let player = Player {
            id: hello.id,
            speed: rng.random_range(200.0..300.0),
            x: rng.random_range(self.config.world_width / 2.0..self.config.world_width * 0.75),
            y: rng.random_range(self.config.world_height / 2.0..self.config.world_height * 0.75),
            ..Player::default()
        };

        self.store.set(
            player.id,
            PlayerWithSocket {
                player,
                sink: event.sink.clone(),
            },
        );

        // The very first frame a peer sees is a bare hello, not a batch.
        let frame = codec::encode_player_hello(self.pool.lease(), player.id);
        if let Err(err) = event.sink.send(frame) {
            log::error!("err: {err}");
        }
    }

    fn on_hello_confirm(&mut self, event: &Event, confirm: PlayerHelloConfirm) {
        if confirm.id != event.player_id {
            self.close_cheater(event, confirm.id);
            return;
        }

        let Some(newcomer) = self.store.get(event.player_id) else {
            return;
        };

        // Twice on purpose: the duplicated entry is how the join reaches
        // the other peers through the broadcast list.
        self.joined_list.push(newcomer.player);
        self.joined_list.push(newcomer.player);

        let cache = &mut self.cache;
        let collector = &mut self.collector;
        self.store.for_each(|id, other| {
            if id == newcomer.player.id {
                return;
            }

            let holder = cache.get_or_mutate(id, &other.player);
            if let Err(err) = collector.add_event(newcomer.player.id, holder) {
                log::warn!("err: {err}");
            }
        });
    }

    fn on_quit(&mut self, event: &Event, quit: PlayerQuit) {
        if quit.id != event.player_id {
            self.close_cheater(event, quit.id);
            return;
        }

        self.store.delete(event.player_id);
        self.collector.remove_player(event.player_id);
        self.cache.remove(event.player_id);

        let holder = EventHolder::new(
            EventKind::PlayerQuit,
            codec::encode_player_quit(self.pool.lease(), quit.id),
        );

        let collector = &mut self.collector;
        self.store.for_each(|id, _| {
            if let Err(err) = collector.add_event(id, holder.clone()) {
                log::warn!("err: {err}");
            }
        });
    }

    fn on_moved(&mut self, event: &Event, moved: PlayerMoved) {
        if moved.player.id != event.player_id {
            self.close_cheater(event, moved.player.id);
            return;
        }

        let Some(mut stored) = self.store.get(moved.player.id) else {
            return;
        };

        // Only the intent is taken from the client; position stays ours.
        stored.player.moving_left = moved.player.moving_left;
        stored.player.moving_right = moved.player.moving_right;
        stored.player.moving_up = moved.player.moving_up;
        stored.player.moving_down = moved.player.moving_down;

        self.store.set(moved.player.id, stored.clone());
        self.moved_list.push(stored.player);
    }

    fn close_cheater(&self, event: &Event, claimed_id: i32) {
        log::error!(
            "{}: player '{}' tried to cheat, claimed id '{claimed_id}'",
            ServerError::IdMismatch,
            event.player_id
        );
        event.sink.close();
    }

    /// Folds the pending lists into at most one broadcast each.
    pub fn flush_pending(&mut self) {
        if !self.moved_list.is_empty() {
            let bytes = codec::encode_player_moved_list(self.pool.lease(), &self.moved_list);
            self.collector
                .add_broadcast(EventHolder::new(EventKind::PlayerMovedList, bytes));
        }

        if !self.joined_list.is_empty() {
            let bytes = codec::encode_player_joined_list(self.pool.lease(), &self.joined_list);
            self.collector
                .add_broadcast(EventHolder::new(EventKind::PlayerJoinedList, bytes));
        }
    }

    /// Sends each player their coalesced batch. Write failures are logged,
    /// the tick never aborts over a single peer.
    pub fn dispatch(&mut self) {
        let collector = &mut self.collector;
        let stats = &mut self.stats;

        self.store.for_each(|id, player| {
            if let Some((batch, _count)) = collector.build_for(id) {
                stats.tick().add_events_sent(1);
                stats.tick().add_message_size(batch.len());

                if let Err(err) = player.sink.send(batch) {
                    log::error!("err: {err}");
                }
            }

            stats.tick().add_active_players(1);
        });
    }

    pub fn reset(&mut self) {
        self.collector.reset();
        self.moved_list.clear();
        self.joined_list.clear();
        self.pool.reset_all();
    }

    /// Integrates motion per axis; a move that would cross the world
    /// boundary is suppressed on that axis alone.
    pub fn integrate(&mut self, delta_secs: f64) {
        let width = self.config.world_width;
        let height = self.config.world_height;

        self.store.for_each_mut(|_, stored| {
            let player = &mut stored.player;
            let moved_delta = delta_secs * player.speed;

            if player.moving_left && player.x - moved_delta >= 0.0 {
                player.x -= moved_delta;
            }
            if player.moving_right && player.x + moved_delta < width {
                player.x += moved_delta;
            }
            if player.moving_up && player.y - moved_delta >= 0.0 {
                player.y -= moved_delta;
            }
            if player.moving_down && player.y + moved_delta < height {
                player.y += moved_delta;
            }
        });
    }
}
