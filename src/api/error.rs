use std::error::Error;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    MalformedEvent,
    UnknownKind(u16),
}

impl Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedEvent => write!(f, "malformed event bytes"),
            Self::UnknownKind(kind) => write!(f, "unknown event kind '{kind}'"),
        }
    }
}

impl Error for ProtocolError {}
