use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use sbp_transport::Connection;
use tracing::trace;
use zerocopy::IntoBytes;

use crate::byte_order::ByteOrder;
use crate::codec::{encode_header, Kind, MessageHeader, TransferConfig, HEADER_SIZE};
use crate::element::{byte_len, Element};
use crate::error::{transport_to_frame_error, Result};
use crate::message::Message;
use crate::transfer::{check_aligned, send_direct, send_elements};

/// Writes typed messages to any `Write` stream.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    order: ByteOrder,
    config: TransferConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T, order: ByteOrder) -> Self {
        Self::with_config(inner, order, TransferConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, order: ByteOrder, config: TransferConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(HEADER_SIZE),
            order,
            config,
        }
    }

    /// Send a header on its own; the payload follows as pieces.
    pub fn send_header(&mut self, kind: Kind, length: u64) -> Result<()> {
        self.buf.clear();
        encode_header(&MessageHeader::new(kind, length), self.order, &mut self.buf);
        send_direct(&mut self.inner, &self.buf)
    }

    /// Send a header declaring `payload.len()` bytes, then the payload.
    ///
    /// Array kinds treat `payload` as elements in host byte order.
    pub fn send_typed(&mut self, kind: Kind, payload: &[u8]) -> Result<()> {
        trace!(%kind, len = payload.len(), "send");
        // A rejected payload must not leave its header on the wire.
        if let Some(width) = kind.element_width() {
            check_aligned(payload.len(), width)?;
        }
        self.send_header(kind, payload.len() as u64)?;
        match kind.element_width() {
            Some(width) => send_elements(&mut self.inner, payload, width, self.order)?,
            None => send_direct(&mut self.inner, payload)?,
        }
        self.flush()
    }

    pub fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        self.send_typed(Kind::Raw, payload)
    }

    pub fn send_chars(&mut self, text: impl AsRef<[u8]>) -> Result<()> {
        self.send_typed(Kind::Char, text.as_ref())
    }

    /// Send a complete array message.
    pub fn send_array<E: Element>(&mut self, values: &[E]) -> Result<()> {
        trace!(kind = %E::KIND, count = values.len(), "send");
        self.send_header(E::KIND, byte_len(values))?;
        self.send_array_piece(values)?;
        self.flush()
    }

    pub fn send_i32s(&mut self, values: &[i32]) -> Result<()> {
        self.send_array(values)
    }

    pub fn send_f64s(&mut self, values: &[f64]) -> Result<()> {
        self.send_array(values)
    }

    pub fn send_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Raw(bytes) => self.send_raw(bytes),
            Message::Char(bytes) => self.send_chars(bytes),
            Message::Int32Array(values) => self.send_i32s(values),
            Message::Float64Array(values) => self.send_f64s(values),
        }
    }

    /// Send part of a byte payload declared by an earlier [`send_header`](Self::send_header).
    pub fn send_piece(&mut self, bytes: &[u8]) -> Result<()> {
        send_direct(&mut self.inner, bytes)
    }

    /// Send part of an array payload declared by an earlier [`send_header`](Self::send_header).
    pub fn send_array_piece<E: Element>(&mut self, values: &[E]) -> Result<()> {
        send_elements(&mut self.inner, values.as_bytes(), E::WIDTH, self.order)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Current writer configuration.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }
}

impl MessageWriter<Connection> {
    /// Create a writer for a `Connection` and apply the write timeout from config.
    pub fn with_config_connection(
        inner: Connection,
        order: ByteOrder,
        config: TransferConfig,
    ) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, order, config))
    }
}
