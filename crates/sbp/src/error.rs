use sbp_frame::FrameError;
use sbp_transport::TransportError;

/// Errors returned by [`Context`](crate::Context) operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dialing, listening, accepting or closing failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Sending or receiving a message failed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

pub type Result<T> = std::result::Result<T, Error>;
