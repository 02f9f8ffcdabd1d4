use std::sync::Arc;

use tokio::net::TcpListener;

use crate::api::event::{EventKind, PlayerHello, PlayerHelloConfirm, PlayerMoved, PlayerQuit};
use crate::server::{
    config::ServerConfig,
    error::ServerError,
    net::PeerSink,
    store::{IdGenerator, PlayerStore},
    tick::Simulation,
};

pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod net;
pub mod pool;
pub mod stats;
pub mod store;
pub mod tick;

/// An intent that crossed from a connection handler into the tick loop.
/// The `player_id` is the one the handler assigned; payload ids are only
/// claims and are verified against it.
#[derive(Debug, Clone)]
pub struct Event {
    pub player_id: i32,
    pub sink: PeerSink,
    pub message: ClientMessage,
}

#[derive(Debug, Clone, Copy)]
pub enum ClientMessage {
    Hello(PlayerHello),
    HelloConfirm(PlayerHelloConfirm),
    Quit(PlayerQuit),
    Moved(PlayerMoved),
}

impl ClientMessage {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Hello(_) => EventKind::PlayerHello,
            Self::HelloConfirm(_) => EventKind::PlayerHelloConfirm,
            Self::Quit(_) => EventKind::PlayerQuit,
            Self::Moved(_) => EventKind::PlayerMoved,
        }
    }
}

pub struct GameServer {
    config: ServerConfig,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Binds the listener, starts the tick loop, and accepts peers until
    /// the process is shut down. Failing to bind is the only fatal error.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.addr.as_str())
            .await
            .map_err(|_| ServerError::BindFailure)?;

        log::info!("listening on {}", self.config.addr);

        let store = Arc::new(PlayerStore::default());
        let ids = Arc::new(IdGenerator::new());
        let (queue_tx, queue_rx) = async_channel::bounded(self.config.queue_capacity);

        tokio::spawn(Simulation::new(self.config.clone(), Arc::clone(&store), queue_rx).run());

        loop {
            if let Ok((stream, peer_addr)) = listener.accept().await {
                log::trace!("accepted connection from {peer_addr}");
                tokio::spawn(net::handle_connection(
                    stream,
                    queue_tx.clone(),
                    Arc::clone(&ids),
                ));
            }
        }
    }
}
