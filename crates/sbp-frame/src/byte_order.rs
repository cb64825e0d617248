//! Host versus wire byte order.
//!
//! The wire carries multi-byte fields little-endian. A big-endian host
//! reverses every header field and every array element on the way in and out;
//! a little-endian host moves bytes untouched.

/// Whether the host's native byte order differs from the wire's.
pub fn detect_swap_needed() -> bool {
    cfg!(target_endian = "big")
}

/// The byte-order decision every transfer consults.
///
/// Computed once per [`detect`](ByteOrder::detect) and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteOrder {
    swap: bool,
}

impl ByteOrder {
    /// The order for this host.
    pub fn detect() -> Self {
        Self {
            swap: detect_swap_needed(),
        }
    }

    /// An explicit decision, e.g. to act as a peer of the other convention.
    pub const fn with_swap(swap: bool) -> Self {
        Self { swap }
    }

    pub const fn swap_needed(self) -> bool {
        self.swap
    }

    pub fn encode_i32(self, value: i32) -> [u8; 4] {
        self.arrange(value.to_ne_bytes())
    }

    pub fn decode_i32(self, bytes: [u8; 4]) -> i32 {
        i32::from_ne_bytes(self.arrange(bytes))
    }

    pub fn encode_u64(self, value: u64) -> [u8; 8] {
        self.arrange(value.to_ne_bytes())
    }

    pub fn decode_u64(self, bytes: [u8; 8]) -> u64 {
        u64::from_ne_bytes(self.arrange(bytes))
    }

    fn arrange<const N: usize>(self, mut bytes: [u8; N]) -> [u8; N] {
        if self.swap {
            bytes.reverse();
        }
        bytes
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::detect()
    }
}
