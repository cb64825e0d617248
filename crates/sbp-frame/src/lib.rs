//! Byte-order aware chunked transfer and typed message framing.
//!
//! Every message is a 12-byte header followed by its payload:
//! - a 4-byte kind (raw, char, int32 array, float64 array)
//! - an 8-byte payload length in bytes
//!
//! Header fields and array elements travel little-endian; hosts of the other
//! convention reverse them element by element through a bounded scratch
//! buffer. Text and raw bytes are never touched.

pub mod byte_order;
pub mod codec;
pub mod element;
pub mod error;
pub mod message;
pub mod reader;
pub mod transfer;
pub mod writer;

pub use byte_order::{detect_swap_needed, ByteOrder};
pub use codec::{
    decode_header, encode_header, Kind, MessageHeader, TransferConfig, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_READ_POLL_INTERVAL, DEFAULT_STALL_RETRY_LIMIT, HEADER_SIZE,
};
pub use element::Element;
pub use error::{FrameError, Result};
pub use message::Message;
pub use reader::{CharsRead, MessageReader};
pub use transfer::{ElementWidth, SCRATCH_SIZE};
pub use writer::MessageWriter;
