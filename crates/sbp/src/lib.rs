//! Simple binary protocol: typed numeric buffers over stream sockets.
//!
//! Programs exchange raw bytes, text, 32-bit integer arrays and 64-bit float
//! arrays, each message a 12-byte header plus payload. Array elements are
//! converted between host and wire byte order on the fly, so peers of either
//! endianness interoperate.
//!
//! # Crate Structure
//!
//! - [`transport`]: dialing, multi-address listeners, fair accept, listener registry
//! - [`frame`]: byte-order codec, chunked transfer, message reader and writer
//! - [`Context`]: per-process protocol state tying the two together
//!
//! ```no_run
//! let ctx = sbp::Context::initialize();
//! let connection = ctx.dial("localhost 9000")?;
//! let (_, mut writer) = ctx.split(connection)?;
//! writer.send_chars("doTests")?;
//! writer.send_i32s(&[0, 1, 2, 3])?;
//! # Ok::<(), sbp::Error>(())
//! ```

mod context;
mod error;

/// Re-export transport types.
pub mod transport {
    pub use sbp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sbp_frame::*;
}

pub use context::{Config, Context};
pub use error::{Error, Result};
pub use sbp_frame::{
    ByteOrder, CharsRead, FrameError, Kind, Message, MessageHeader, MessageReader, MessageWriter,
    TransferConfig,
};
pub use sbp_transport::{
    hostname, Accepted, CloseMode, Connection, ListenerId, TransportConfig, TransportError,
};
