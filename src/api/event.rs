use bytes::Bytes;

use crate::api::error::ProtocolError;

/// Closed set of wire message kinds. The numeric values are part of the
/// protocol and must stay stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventKind {
    NilEvent = 0,
    PlayerHello = 1,
    PlayerHelloConfirm = 2,
    PlayerQuit = 3,
    PlayerJoined = 4,
    PlayerMoved = 5,
    PlayerJoinedList = 6,
    PlayerMovedList = 7,
    RawEvent = 8,
    EventList = 9,
    KindHolder = 10,
}

impl TryFrom<u16> for EventKind {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::NilEvent),
            1 => Ok(Self::PlayerHello),
            2 => Ok(Self::PlayerHelloConfirm),
            3 => Ok(Self::PlayerQuit),
            4 => Ok(Self::PlayerJoined),
            5 => Ok(Self::PlayerMoved),
            6 => Ok(Self::PlayerJoinedList),
            7 => Ok(Self::PlayerMovedList),
            8 => Ok(Self::RawEvent),
            9 => Ok(Self::EventList),
            10 => Ok(Self::KindHolder),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

/// One player's kinematic state. Positions are kept with subpixel precision
/// server-side and truncate to whole units on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Player {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    pub moving_left: bool,
    pub moving_right: bool,
    pub moving_up: bool,
    pub moving_down: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHello {
    pub id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHelloConfirm {
    pub id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerQuit {
    pub id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerJoined {
    pub player: Player,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerMoved {
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerJoinedList {
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerMovedList {
    pub players: Vec<Player>,
}

/// An event list carries its entries as opaque encoded messages.
#[derive(Debug, Clone, PartialEq)]
pub struct EventList {
    pub events: Vec<Bytes>,
}

/// A decoded top-level message of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    Nil,
    PlayerHello(PlayerHello),
    PlayerHelloConfirm(PlayerHelloConfirm),
    PlayerQuit(PlayerQuit),
    PlayerJoined(PlayerJoined),
    PlayerMoved(PlayerMoved),
    PlayerJoinedList(PlayerJoinedList),
    PlayerMovedList(PlayerMovedList),
    RawEvent(Bytes),
    EventList(EventList),
}

/// An encoded message waiting to be wrapped into a batch. Cloning is cheap,
/// the payload is refcounted.
#[derive(Debug, Clone)]
pub struct EventHolder {
    kind: EventKind,
    bytes: Bytes,
}

impl EventHolder {
    pub fn new(kind: EventKind, bytes: Bytes) -> Self {
        Self { kind, bytes }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}
