use std::collections::HashMap;

use bytes::Bytes;

use crate::api::{
    codec::{self, FlatBuilder},
    event::{EventHolder, EventKind},
};
use crate::server::error::ServerError;

/// Accumulates one player's targeted events and builds their batch. Once a
/// batch was built the builder is frozen until the next tick reset.
#[derive(Debug)]
pub struct EventListBuilder {
    builder: FlatBuilder,
    events: Vec<EventHolder>,
    started: bool,
}

impl EventListBuilder {
    fn new(capacity: usize) -> Self {
        Self {
            builder: FlatBuilder::new(capacity),
            events: Vec::new(),
            started: false,
        }
    }

    fn add_raw_event(&mut self, event: EventHolder) -> Result<(), ServerError> {
        if self.started {
            return Err(ServerError::BuilderFrozen);
        }

        self.events.push(event);
        Ok(())
    }

    fn build(&mut self, broadcasts: &[EventHolder]) -> Option<(Bytes, usize)> {
        let total = self.events.len() + broadcasts.len();
        if total == 0 {
            return None;
        }

        self.started = true;
        let batch = codec::encode_event_list(&mut self.builder, &self.events, broadcasts);
        Some((batch, total))
    }

    fn reset(&mut self) {
        self.builder.reset();
        self.events.clear();
        self.started = false;
    }
}

/// Per-tick outbound traffic: targeted per-player events plus the broadcast
/// sequence appended to every player's batch.
#[derive(Debug, Default)]
pub struct EventCollector {
    player_events: HashMap<i32, EventListBuilder>,
    broadcasts: Vec<EventHolder>,
}

impl EventCollector {
    pub fn add_event(&mut self, player_id: i32, event: EventHolder) -> Result<(), ServerError> {
        if event.kind() == EventKind::NilEvent {
            return Ok(());
        }

        self.player_events
            .entry(player_id)
            .or_insert_with(|| EventListBuilder::new(256))
            .add_raw_event(event)
    }

    pub fn add_broadcast(&mut self, event: EventHolder) {
        self.broadcasts.push(event);
    }

    /// Builds the player's coalesced batch: targeted events in insertion
    /// order, then broadcasts in insertion order. `None` when there is
    /// nothing to send.
    pub fn build_for(&mut self, player_id: i32) -> Option<(Bytes, usize)> {
        match self.player_events.get_mut(&player_id) {
            Some(builder) => builder.build(&self.broadcasts),
            None => EventListBuilder::new(512).build(&self.broadcasts),
        }
    }

    pub fn remove_player(&mut self, player_id: i32) {
        self.player_events.remove(&player_id);
    }

    pub fn reset(&mut self) {
        for builder in self.player_events.values_mut() {
            builder.reset();
        }

        self.broadcasts.clear();
    }
}
