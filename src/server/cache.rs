use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;

use crate::api::{
    codec::{self, FlatBuilder},
    event::{EventHolder, EventKind, Player},
};

/// Caches the encoded `PlayerJoined` snapshot per player. Joined snapshots
/// are sent to every newcomer for every existing player, and re-encoding
/// them from scratch dominates per-tick allocations at scale; instead the
/// mutable fields are overwritten in place at their fixed offsets.
#[derive(Debug, Default)]
pub struct FlatCache {
    player_joined: HashMap<i32, Vec<u8>>,
}

impl FlatCache {
    pub fn get_or_mutate(&mut self, id: i32, player: &Player) -> EventHolder {
        let bytes = match self.player_joined.entry(id) {
            Entry::Occupied(mut entry) => {
                codec::patch_player_joined(entry.get_mut(), player);
                Bytes::copy_from_slice(entry.get())
            }
            Entry::Vacant(entry) => {
                let mut builder = FlatBuilder::new(512);
                let encoded = codec::encode_player_joined(&mut builder, player);
                entry.insert(encoded.to_vec());
                encoded
            }
        };

        EventHolder::new(EventKind::PlayerJoined, bytes)
    }

    pub fn remove(&mut self, id: i32) {
        self.player_joined.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.player_joined.len()
    }
}
