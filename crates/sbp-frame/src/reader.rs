use std::io::Read;

use bytes::BytesMut;
use sbp_transport::Connection;
use tracing::trace;
use zerocopy::IntoBytes;

use crate::byte_order::ByteOrder;
use crate::codec::{decode_header, Kind, MessageHeader, TransferConfig, HEADER_SIZE};
use crate::element::Element;
use crate::error::{transport_to_frame_error, FrameError, Result};
use crate::message::Message;
use crate::transfer::{receive_direct, receive_elements, skip};

/// Outcome of reading a `Char` message into a fixed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsRead {
    /// Payload bytes stored at the start of the buffer.
    pub len: usize,
    /// The message was longer than the buffer; the excess was discarded.
    pub truncated: bool,
}

/// Reads typed messages from any `Read` stream.
///
/// Stall detection only works if reads on the stream time out; use
/// [`MessageReader::with_config_connection`] to apply the poll interval.
pub struct MessageReader<T> {
    inner: T,
    order: ByteOrder,
    config: TransferConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T, order: ByteOrder) -> Self {
        Self::with_config(inner, order, TransferConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, order: ByteOrder, config: TransferConfig) -> Self {
        Self {
            inner,
            order,
            config,
        }
    }

    /// Read the next 12-byte header.
    pub fn read_header(&mut self) -> Result<MessageHeader> {
        let mut wire = [0u8; HEADER_SIZE];
        receive_direct(&mut self.inner, &mut wire, self.config.stall_retry_limit)?;
        let header = decode_header(&wire, self.order)?;
        trace!(kind = %header.kind, length = header.length, "header");
        Ok(header)
    }

    /// Read a message of `kind` whose payload exactly fills `dst`.
    ///
    /// On [`FrameError::UnexpectedKind`] or [`FrameError::LengthMismatch`] the
    /// payload is left on the stream; the caller decides whether to
    /// [`skip`](Self::skip) it or drop the connection.
    pub fn read_typed(&mut self, kind: Kind, dst: &mut [u8]) -> Result<()> {
        let header = self.read_header()?;
        expect(&header, kind, dst.len() as u64)?;
        match kind.element_width() {
            Some(width) => receive_elements(
                &mut self.inner,
                dst,
                width,
                self.order,
                self.config.stall_retry_limit,
            ),
            None => self.read_piece(dst),
        }
    }

    /// Read an array message whose payload exactly fills `dst`.
    pub fn read_array<E: Element>(&mut self, dst: &mut [E]) -> Result<()> {
        let header = self.read_header()?;
        expect(&header, E::KIND, dst.as_bytes().len() as u64)?;
        self.read_array_piece(dst)
    }

    pub fn read_i32s(&mut self, dst: &mut [i32]) -> Result<()> {
        self.read_array(dst)
    }

    pub fn read_f64s(&mut self, dst: &mut [f64]) -> Result<()> {
        self.read_array(dst)
    }

    /// Read a `Char` message into `dst`, padding the unused tail with NUL.
    pub fn read_chars(&mut self, dst: &mut [u8]) -> Result<CharsRead> {
        self.read_chars_padded(dst, 0)
    }

    /// Read a `Char` message into `dst`, padding the unused tail with `pad`.
    ///
    /// Text longer than `dst` is truncated: the first `dst.len()` bytes are
    /// kept and the remainder is consumed from the stream, so the next read
    /// starts at the following header.
    pub fn read_chars_padded(&mut self, dst: &mut [u8], pad: u8) -> Result<CharsRead> {
        let header = self.read_header()?;
        if header.kind != Kind::Char {
            return Err(FrameError::UnexpectedKind {
                expected: Kind::Char,
                actual: header.kind,
            });
        }

        let capacity = dst.len() as u64;
        if header.length <= capacity {
            let len = header.length as usize;
            self.read_piece(&mut dst[..len])?;
            dst[len..].fill(pad);
            return Ok(CharsRead {
                len,
                truncated: false,
            });
        }

        self.read_piece(dst)?;
        self.skip(header.length - capacity)?;
        trace!(declared = header.length, kept = dst.len(), "text truncated");
        Ok(CharsRead {
            len: dst.len(),
            truncated: true,
        })
    }

    /// Read part of a byte payload whose header was read separately.
    pub fn read_piece(&mut self, dst: &mut [u8]) -> Result<()> {
        receive_direct(&mut self.inner, dst, self.config.stall_retry_limit)
    }

    /// Read part of an array payload whose header was read separately.
    pub fn read_array_piece<E: Element>(&mut self, dst: &mut [E]) -> Result<()> {
        receive_elements(
            &mut self.inner,
            dst.as_mut_bytes(),
            E::WIDTH,
            self.order,
            self.config.stall_retry_limit,
        )
    }

    /// Read the next message of whatever kind, allocating for its payload.
    ///
    /// Payloads above `max_message_size`, or array payloads that are not a
    /// whole number of elements, are rejected with the payload left unread.
    pub fn read_message(&mut self) -> Result<Message> {
        let header = self.read_header()?;
        if header.length > self.config.max_message_size as u64 {
            return Err(FrameError::MessageTooLarge {
                size: header.length,
                max: self.config.max_message_size,
            });
        }
        if let Some(width) = header.kind.element_width() {
            if header.length % width.bytes() as u64 != 0 {
                return Err(FrameError::Misaligned {
                    len: header.length,
                    width: width.bytes(),
                });
            }
        }

        let len = header.length as usize;
        match header.kind {
            Kind::Raw | Kind::Char => {
                let mut payload = BytesMut::zeroed(len);
                self.read_piece(&mut payload)?;
                let payload = payload.freeze();
                Ok(if header.kind == Kind::Raw {
                    Message::Raw(payload)
                } else {
                    Message::Char(payload)
                })
            }
            Kind::Int32Array => {
                let mut values = vec![0i32; len / 4];
                self.read_array_piece(&mut values)?;
                Ok(Message::Int32Array(values))
            }
            Kind::Float64Array => {
                let mut values = vec![0f64; len / 8];
                self.read_array_piece(&mut values)?;
                Ok(Message::Float64Array(values))
            }
        }
    }

    /// Discard `count` payload bytes.
    pub fn skip(&mut self, count: u64) -> Result<()> {
        skip(&mut self.inner, count, self.config.stall_retry_limit)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Current reader configuration.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}

impl MessageReader<Connection> {
    /// Create a reader for a `Connection` and apply the poll interval from
    /// config as its read timeout.
    pub fn with_config_connection(
        inner: Connection,
        order: ByteOrder,
        config: TransferConfig,
    ) -> Result<Self> {
        inner
            .set_read_timeout(config.read_poll_interval)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, order, config))
    }
}

fn expect(header: &MessageHeader, kind: Kind, len: u64) -> Result<()> {
    if header.kind != kind {
        return Err(FrameError::UnexpectedKind {
            expected: kind,
            actual: header.kind,
        });
    }
    if header.length != len {
        return Err(FrameError::LengthMismatch {
            expected: len,
            declared: header.length,
        });
    }
    Ok(())
}
