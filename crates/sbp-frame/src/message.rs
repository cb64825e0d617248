use std::borrow::Cow;

use bytes::Bytes;

use crate::codec::Kind;
use crate::element::byte_len;

/// A complete decoded message of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Raw(Bytes),
    Char(Bytes),
    Int32Array(Vec<i32>),
    Float64Array(Vec<f64>),
}

impl Message {
    /// Build a text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Char(Bytes::from(text.into()))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Raw(_) => Kind::Raw,
            Self::Char(_) => Kind::Char,
            Self::Int32Array(_) => Kind::Int32Array,
            Self::Float64Array(_) => Kind::Float64Array,
        }
    }

    /// Payload length as declared in the header.
    pub fn byte_len(&self) -> u64 {
        match self {
            Self::Raw(bytes) | Self::Char(bytes) => bytes.len() as u64,
            Self::Int32Array(values) => byte_len(values),
            Self::Float64Array(values) => byte_len(values),
        }
    }

    /// Number of elements (bytes for byte kinds).
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(bytes) | Self::Char(bytes) => bytes.len(),
            Self::Int32Array(values) => values.len(),
            Self::Float64Array(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text of a `Char` message, lossily decoded.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Char(bytes) => Some(String::from_utf8_lossy(bytes)),
            _ => None,
        }
    }
}

impl From<Vec<i32>> for Message {
    fn from(values: Vec<i32>) -> Self {
        Self::Int32Array(values)
    }
}

impl From<Vec<f64>> for Message {
    fn from(values: Vec<f64>) -> Self {
        Self::Float64Array(values)
    }
}
