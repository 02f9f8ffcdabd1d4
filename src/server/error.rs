use std::error::Error;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    BindFailure,
    IdMismatch,
    BuilderFrozen,
    PeerWriteFailed,
    PeerReadFailed,
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BindFailure => write!(f, "failed to bind the listening socket"),
            Self::IdMismatch => write!(f, "payload id does not match the stream's player id"),
            Self::BuilderFrozen => write!(f, "batch already built for this player this tick"),
            Self::PeerWriteFailed => write!(f, "lost connection while writing to peer"),
            Self::PeerReadFailed => write!(f, "lost connection while reading from peer"),
        }
    }
}

impl Error for ServerError {}
