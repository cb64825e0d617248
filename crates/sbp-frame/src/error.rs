use sbp_transport::TransportError;

use crate::codec::Kind;

/// Errors that can occur while transferring or framing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A single write accepted fewer bytes than requested. The remainder is
    /// not resent, so the stream is no longer in sync.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// Too many consecutive reads produced no data.
    #[error("connection stalled after {received} of {expected} bytes")]
    StalledConnection { received: u64, expected: u64 },

    /// The peer closed its write side before all bytes arrived.
    #[error("connection closed after {received} of {expected} bytes")]
    ConnectionClosed { received: u64, expected: u64 },

    /// A typed read found a header of another kind. The payload is unread.
    #[error("expected {expected} message, got {actual}")]
    UnexpectedKind { expected: Kind, actual: Kind },

    /// A typed read's destination does not match the declared payload length.
    /// The payload is unread.
    #[error("destination holds {expected} bytes but header declares {declared}")]
    LengthMismatch { expected: u64, declared: u64 },

    /// The header carries a kind code outside the known set.
    #[error("unknown message kind {0}")]
    UnknownKind(i32),

    /// An element payload is not a whole number of elements.
    #[error("{len} bytes is not a multiple of the {width}-byte element width")]
    Misaligned { len: u64, width: usize },

    /// The declared payload exceeds the configured limit. The payload is unread.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: u64, max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for an end of stream that arrived between messages.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::ConnectionClosed { received: 0, .. })
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::CloseFailed(io) => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
