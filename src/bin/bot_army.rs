//! Drives a small army of simulated clients against a running server: each
//! bot completes the hello handshake, then keeps flipping random movement
//! intents while draining the batches the server fans out.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use stampede::api::{
    codec::{self, FlatBuilder},
    event::{GameMessage, Player},
};

const DEFAULT_BOTS: usize = 10;
const MOVE_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() {
    stampede::logger::init_from_env();

    let addr =
        std::env::var("STAMPEDE_ADDR").unwrap_or_else(|_| "127.0.0.1:6969".to_string());
    let count = std::env::var("BOTS")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_BOTS);

    log::info!("spawning {count} bots against {addr}");

    let mut bots = Vec::with_capacity(count);
    for n in 0..count {
        bots.push(tokio::spawn(run_bot(addr.clone(), n)));
    }

    for bot in bots {
        let _ = bot.await;
    }
}

async fn run_bot(addr: String, n: usize) {
    let url = format!("ws://{addr}/websocket");
    let (stream, _) = match connect_async(url).await {
        Ok(connected) => connected,
        Err(err) => {
            log::error!("bot {n} failed to connect: {err}");
            return;
        }
    };

    let (mut write, mut read) = stream.split();
    let mut builder = FlatBuilder::new(256);

    // The first frame is the bare hello carrying our id.
    let my_id = loop {
        match read.next().await {
            Some(Ok(Message::Binary(data))) => {
                match codec::parse_event_bytes(&data) {
                    Ok((_, GameMessage::PlayerHello(hello))) => break hello.id,
                    Ok((kind, _)) => {
                        log::error!("bot {n} expected a hello, got '{kind:?}'");
                        return;
                    }
                    Err(err) => {
                        log::error!("err: {err}");
                        return;
                    }
                }
            }
            Some(Ok(_)) => continue,
            _ => return,
        }
    };

    let confirm = codec::encode_player_hello_confirm(&mut builder, my_id);
    if write.send(Message::Binary(confirm)).await.is_err() {
        return;
    }

    log::info!("bot {n} joined as player '{my_id}'");

    let mut ticker = tokio::time::interval(MOVE_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let intent = Player {
                    id: my_id,
                    moving_left: rand::random(),
                    moving_right: rand::random(),
                    moving_up: rand::random(),
                    moving_down: rand::random(),
                    ..Player::default()
                };

                builder.reset();
                let frame = codec::encode_player_moved(&mut builder, &intent);
                if write.send(Message::Binary(frame)).await.is_err() {
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Binary(data))) => {
                        match codec::parse_event_bytes(&data) {
                            Ok((_, GameMessage::EventList(list))) => {
                                log::trace!("bot {n} received a batch of {}", list.events.len());
                            }
                            Ok((kind, _)) => {
                                log::trace!("bot {n} received '{kind:?}'");
                            }
                            Err(err) => log::error!("err: {err}"),
                        }
                    }
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    log::info!("bot {n} disconnected");
}
