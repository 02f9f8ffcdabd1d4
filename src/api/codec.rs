//! Fixed-layout little-endian wire codec.
//!
//! Every top-level message starts with its `kind` as a `u16` at offset 0,
//! so any buffer can be probed with [`kind_of`] without knowing its shape.
//!
//! ```text
//! Player record (20)            id:i32 x:i32 y:i32 speed:i32 l:u8 r:u8 u:u8 d:u8
//! PlayerHello/Confirm/Quit (6)  kind:u16 id:i32
//! PlayerJoined/Moved (22)       kind:u16 player:Player
//! Player*List                   kind:u16 count:u32 players:count*Player
//! RawEvent                      kind:u16 len:u32 raw_data:len bytes
//! EventList                     kind:u16 count:u32 events:count*RawEvent
//! ```
//!
//! The `Player` fields sit at fixed offsets inside `PlayerJoined`, which is
//! what allows the flat cache to overwrite them in place without
//! re-encoding.

use bytes::Bytes;

use crate::api::{
    error::ProtocolError,
    event::{
        EventHolder, EventKind, EventList, GameMessage, Player, PlayerHello, PlayerHelloConfirm,
        PlayerJoined, PlayerJoinedList, PlayerMoved, PlayerMovedList, PlayerQuit,
    },
};

pub const PLAYER_RECORD_LEN: usize = 20;

const KIND_LEN: usize = 2;

// Offsets of the mutable player fields inside a PlayerJoined/PlayerMoved
// message (kind prefix + record-relative offset).
const PLAYER_X_OFFSET: usize = KIND_LEN + 4;
const PLAYER_Y_OFFSET: usize = KIND_LEN + 8;
const PLAYER_SPEED_OFFSET: usize = KIND_LEN + 12;
const PLAYER_FLAGS_OFFSET: usize = KIND_LEN + 16;

/// Reusable serialization arena. Encoded messages append to the buffer and
/// are copied out as refcounted [`Bytes`]; `reset` keeps the allocation.
#[derive(Debug, Default)]
pub struct FlatBuilder {
    buf: Vec<u8>,
}

impl FlatBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn mark(&self) -> usize {
        self.buf.len()
    }

    fn bytes_from(&self, mark: usize) -> Bytes {
        Bytes::copy_from_slice(&self.buf[mark..])
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    fn put_slice(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    fn put_player(&mut self, player: &Player) {
        self.put_i32(player.id);
        self.put_i32(player.x as i32);
        self.put_i32(player.y as i32);
        self.put_i32(player.speed as i32);
        self.put_bool(player.moving_left);
        self.put_bool(player.moving_right);
        self.put_bool(player.moving_up);
        self.put_bool(player.moving_down);
    }
}

fn encode_id_event(builder: &mut FlatBuilder, kind: EventKind, id: i32) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(kind as u16);
    builder.put_i32(id);
    builder.bytes_from(mark)
}

pub fn encode_nil_event(builder: &mut FlatBuilder) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(EventKind::NilEvent as u16);
    builder.bytes_from(mark)
}

pub fn encode_player_hello(builder: &mut FlatBuilder, id: i32) -> Bytes {
    encode_id_event(builder, EventKind::PlayerHello, id)
}

pub fn encode_player_hello_confirm(builder: &mut FlatBuilder, id: i32) -> Bytes {
    encode_id_event(builder, EventKind::PlayerHelloConfirm, id)
}

pub fn encode_player_quit(builder: &mut FlatBuilder, id: i32) -> Bytes {
    encode_id_event(builder, EventKind::PlayerQuit, id)
}

pub fn encode_player_joined(builder: &mut FlatBuilder, player: &Player) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(EventKind::PlayerJoined as u16);
    builder.put_player(player);
    builder.bytes_from(mark)
}

pub fn encode_player_moved(builder: &mut FlatBuilder, player: &Player) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(EventKind::PlayerMoved as u16);
    builder.put_player(player);
    builder.bytes_from(mark)
}

fn encode_player_list(builder: &mut FlatBuilder, kind: EventKind, players: &[Player]) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(kind as u16);
    builder.put_u32(players.len() as u32);
    for player in players {
        builder.put_player(player);
    }
    builder.bytes_from(mark)
}

pub fn encode_player_joined_list(builder: &mut FlatBuilder, players: &[Player]) -> Bytes {
    encode_player_list(builder, EventKind::PlayerJoinedList, players)
}

pub fn encode_player_moved_list(builder: &mut FlatBuilder, players: &[Player]) -> Bytes {
    encode_player_list(builder, EventKind::PlayerMovedList, players)
}

pub fn encode_raw_event(builder: &mut FlatBuilder, raw_data: &[u8]) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(EventKind::RawEvent as u16);
    builder.put_u32(raw_data.len() as u32);
    builder.put_slice(raw_data);
    builder.bytes_from(mark)
}

/// Encodes the single per-tick batch: targeted events first, broadcasts
/// second, each wrapped as a `RawEvent`.
pub fn encode_event_list(
    builder: &mut FlatBuilder,
    targeted: &[EventHolder],
    broadcasts: &[EventHolder],
) -> Bytes {
    let mark = builder.mark();
    builder.put_u16(EventKind::EventList as u16);
    builder.put_u32((targeted.len() + broadcasts.len()) as u32);
    for holder in targeted.iter().chain(broadcasts.iter()) {
        builder.put_u16(EventKind::RawEvent as u16);
        builder.put_u32(holder.bytes().len() as u32);
        builder.put_slice(holder.bytes());
    }
    builder.bytes_from(mark)
}

/// Overwrites the mutable fields of an encoded `PlayerJoined` in place.
/// The id field is left untouched.
pub fn patch_player_joined(buf: &mut [u8], player: &Player) {
    debug_assert_eq!(buf.len(), KIND_LEN + PLAYER_RECORD_LEN);

    buf[PLAYER_X_OFFSET..PLAYER_X_OFFSET + 4].copy_from_slice(&(player.x as i32).to_le_bytes());
    buf[PLAYER_Y_OFFSET..PLAYER_Y_OFFSET + 4].copy_from_slice(&(player.y as i32).to_le_bytes());
    buf[PLAYER_SPEED_OFFSET..PLAYER_SPEED_OFFSET + 4]
        .copy_from_slice(&(player.speed as i32).to_le_bytes());
    buf[PLAYER_FLAGS_OFFSET] = player.moving_left as u8;
    buf[PLAYER_FLAGS_OFFSET + 1] = player.moving_right as u8;
    buf[PLAYER_FLAGS_OFFSET + 2] = player.moving_up as u8;
    buf[PLAYER_FLAGS_OFFSET + 3] = player.moving_down as u8;
}

struct FlatReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FlatReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ProtocolError::MalformedEvent)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        match self.take(1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ProtocolError::MalformedEvent),
        }
    }

    fn read_player(&mut self) -> Result<Player, ProtocolError> {
        Ok(Player {
            id: self.read_i32()?,
            x: self.read_i32()? as f64,
            y: self.read_i32()? as f64,
            speed: self.read_i32()? as f64,
            moving_left: self.read_bool()?,
            moving_right: self.read_bool()?,
            moving_up: self.read_bool()?,
            moving_down: self.read_bool()?,
        })
    }
}

/// Reads the kind discriminator off any encoded message, the `KindHolder`
/// view of a buffer.
pub fn kind_of(data: &[u8]) -> Result<EventKind, ProtocolError> {
    let mut reader = FlatReader::new(data);
    EventKind::try_from(reader.read_u16()?)
}

/// Decodes a top-level message. Malformed input is reported, never panics.
pub fn parse_event_bytes(data: &[u8]) -> Result<(EventKind, GameMessage), ProtocolError> {
    let mut reader = FlatReader::new(data);
    let kind = EventKind::try_from(reader.read_u16()?)?;

    let message = match kind {
        EventKind::NilEvent | EventKind::KindHolder => GameMessage::Nil,
        EventKind::PlayerHello => GameMessage::PlayerHello(PlayerHello {
            id: reader.read_i32()?,
        }),
        EventKind::PlayerHelloConfirm => GameMessage::PlayerHelloConfirm(PlayerHelloConfirm {
            id: reader.read_i32()?,
        }),
        EventKind::PlayerQuit => GameMessage::PlayerQuit(PlayerQuit {
            id: reader.read_i32()?,
        }),
        EventKind::PlayerJoined => GameMessage::PlayerJoined(PlayerJoined {
            player: reader.read_player()?,
        }),
        EventKind::PlayerMoved => GameMessage::PlayerMoved(PlayerMoved {
            player: reader.read_player()?,
        }),
        EventKind::PlayerJoinedList => GameMessage::PlayerJoinedList(PlayerJoinedList {
            players: read_player_list(&mut reader)?,
        }),
        EventKind::PlayerMovedList => GameMessage::PlayerMovedList(PlayerMovedList {
            players: read_player_list(&mut reader)?,
        }),
        EventKind::RawEvent => GameMessage::RawEvent(read_raw_event(&mut reader)?),
        EventKind::EventList => {
            let count = reader.read_u32()?;
            let mut events = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                let raw_kind = reader.read_u16()?;
                if raw_kind != EventKind::RawEvent as u16 {
                    return Err(ProtocolError::MalformedEvent);
                }
                events.push(read_raw_event(&mut reader)?);
            }
            GameMessage::EventList(EventList { events })
        }
    };

    Ok((kind, message))
}

fn read_player_list(reader: &mut FlatReader<'_>) -> Result<Vec<Player>, ProtocolError> {
    let count = reader.read_u32()?;
    let mut players = Vec::with_capacity(count.min(1024) as usize);
    for _ in 0..count {
        players.push(reader.read_player()?);
    }
    Ok(players)
}

fn read_raw_event(reader: &mut FlatReader<'_>) -> Result<Bytes, ProtocolError> {
    let len = reader.read_u32()? as usize;
    Ok(Bytes::copy_from_slice(reader.take(len)?))
}
