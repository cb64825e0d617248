use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::byte_order::ByteOrder;
use crate::error::{FrameError, Result};
use crate::transfer::ElementWidth;

/// Message header: kind (4) + length (8) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Consecutive zero-data reads tolerated within one receive call.
pub const DEFAULT_STALL_RETRY_LIMIT: u32 = 10_000;

/// Read timeout applied to connections; each expiry counts as a zero-data read.
pub const DEFAULT_READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default upper bound for messages read into freshly allocated buffers: 256 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Payload type carried in a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Kind {
    /// Opaque bytes, never reordered.
    Raw = 0,
    /// Text bytes, never reordered.
    Char = 1,
    /// 4-byte signed integers.
    Int32Array = 2,
    /// 8-byte IEEE-754 doubles.
    Float64Array = 3,
}

impl Kind {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Raw),
            1 => Ok(Self::Char),
            2 => Ok(Self::Int32Array),
            3 => Ok(Self::Float64Array),
            other => Err(FrameError::UnknownKind(other)),
        }
    }

    /// Element width for array kinds; `None` for byte payloads.
    pub const fn element_width(self) -> Option<ElementWidth> {
        match self {
            Self::Raw | Self::Char => None,
            Self::Int32Array => Some(ElementWidth::Four),
            Self::Float64Array => Some(ElementWidth::Eight),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Char => "char",
            Self::Int32Array => "int32-array",
            Self::Float64Array => "float64-array",
        }
    }
}

impl TryFrom<i32> for Kind {
    type Error = FrameError;

    fn try_from(code: i32) -> Result<Self> {
        Self::from_code(code)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind and exact payload byte count of the message that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub kind: Kind,
    pub length: u64,
}

impl MessageHeader {
    pub fn new(kind: Kind, length: u64) -> Self {
        Self { kind, length }
    }
}

/// Encode a header into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────────┬─────────────────────┐
/// │ Kind (4B)    │ Length (8B)          │ Payload             │
/// │ i32, LE      │ u64, LE              │ (Length bytes)      │
/// └──────────────┴──────────────────────┴─────────────────────┘
/// ```
///
/// Both fields go through `order`, whatever the payload kind.
pub fn encode_header(header: &MessageHeader, order: ByteOrder, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_slice(&order.encode_i32(header.kind.code()));
    dst.put_slice(&order.encode_u64(header.length));
}

/// Decode a header from its 12 wire bytes.
pub fn decode_header(src: &[u8; HEADER_SIZE], order: ByteOrder) -> Result<MessageHeader> {
    let mut kind = [0u8; 4];
    let mut length = [0u8; 8];
    kind.copy_from_slice(&src[..4]);
    length.copy_from_slice(&src[4..]);

    Ok(MessageHeader {
        kind: Kind::from_code(order.decode_i32(kind))?,
        length: order.decode_u64(length),
    })
}

/// Configuration for message readers and writers.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Consecutive zero-data reads before a receive fails. Default: 10,000.
    pub stall_retry_limit: u32,
    /// Read timeout applied to connections. Default: 10 ms.
    ///
    /// `None` blocks indefinitely, which disables stall detection.
    pub read_poll_interval: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
    /// Largest payload [`read_message`](crate::MessageReader::read_message)
    /// allocates for. Default: 256 MiB.
    pub max_message_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            stall_retry_limit: DEFAULT_STALL_RETRY_LIMIT,
            read_poll_interval: Some(DEFAULT_READ_POLL_INTERVAL),
            write_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(header: MessageHeader, order: ByteOrder) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::new();
        encode_header(&header, order, &mut buf);
        buf[..].try_into().unwrap()
    }

    #[test]
    fn header_layout_is_little_endian() {
        let wire = encode(
            MessageHeader::new(Kind::Int32Array, 40),
            ByteOrder::detect(),
        );
        assert_eq!(wire, [2, 0, 0, 0, 40, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn header_swapped_for_foreign_peer() {
        let wire = encode(
            MessageHeader::new(Kind::Char, 7),
            ByteOrder::with_swap(!ByteOrder::detect().swap_needed()),
        );
        assert_eq!(wire, [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 7]);
    }

    #[test]
    fn header_recovers_every_kind_and_extreme_lengths() {
        let kinds = [Kind::Raw, Kind::Char, Kind::Int32Array, Kind::Float64Array];
        let lengths = [0, 1, 4096, u64::from(u32::MAX) + 1, u64::MAX];
        for order in [ByteOrder::with_swap(false), ByteOrder::with_swap(true)] {
            for kind in kinds {
                for length in lengths {
                    let header = MessageHeader::new(kind, length);
                    assert_eq!(decode_header(&encode(header, order), order).unwrap(), header);
                }
            }
        }
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut wire = [0u8; HEADER_SIZE];
        wire[..4].copy_from_slice(&ByteOrder::detect().encode_i32(4));
        let err = decode_header(&wire, ByteOrder::detect()).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(4)));
        assert!(matches!(Kind::try_from(-1), Err(FrameError::UnknownKind(-1))));
    }

    #[test]
    fn kind_codes_and_widths() {
        assert_eq!(Kind::Raw.code(), 0);
        assert_eq!(Kind::Float64Array.code(), 3);
        assert_eq!(Kind::Char.element_width(), None);
        assert_eq!(Kind::Int32Array.element_width(), Some(ElementWidth::Four));
        assert_eq!(Kind::Float64Array.to_string(), "float64-array");
    }

    #[test]
    fn default_config() {
        let cfg = TransferConfig::default();
        assert_eq!(cfg.stall_retry_limit, 10_000);
        assert_eq!(cfg.read_poll_interval, Some(Duration::from_millis(10)));
        assert_eq!(cfg.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }
}
