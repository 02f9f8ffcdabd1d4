use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::api::event::Player;
use crate::server::net::PeerSink;

/// Hands out player ids for the lifetime of the process. Ids start at 1,
/// only grow, and are never recycled.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: AtomicI32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i32 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// A player record joined with its outbound sink.
#[derive(Debug, Clone)]
pub struct PlayerWithSocket {
    pub player: Player,
    pub sink: PeerSink,
}

/// Concurrent map from player id to player record. Iteration observes a
/// consistent per-key snapshot, not a globally consistent moment.
#[derive(Debug, Default)]
pub struct PlayerStore {
    players: RwLock<HashMap<i32, PlayerWithSocket>>,
}

impl PlayerStore {
    pub fn get(&self, id: i32) -> Option<PlayerWithSocket> {
        self.players
            .read()
            .expect("lock should never be poisoned")
            .get(&id)
            .cloned()
    }

    pub fn set(&self, id: i32, player: PlayerWithSocket) {
        self.players
            .write()
            .expect("lock should never be poisoned")
            .insert(id, player);
    }

    pub fn delete(&self, id: i32) {
        self.players
            .write()
            .expect("lock should never be poisoned")
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.players
            .read()
            .expect("lock should never be poisoned")
            .len()
    }

    pub fn for_each(&self, mut f: impl FnMut(i32, &PlayerWithSocket)) {
        let players = self.players.read().expect("lock should never be poisoned");
        for (id, player) in players.iter() {
            f(*id, player);
        }
    }

    pub fn for_each_mut(&self, mut f: impl FnMut(i32, &mut PlayerWithSocket)) {
        let mut players = self.players.write().expect("lock should never be poisoned");
        for (id, player) in players.iter_mut() {
            f(*id, player);
        }
    }
}
