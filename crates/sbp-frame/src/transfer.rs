//! Moving byte ranges across a stream, converting element byte order on the way.
//!
//! Writes are single-shot: a write that accepts fewer bytes than offered is an
//! error, not a cue to resend the remainder. Reads loop until the exact range
//! is filled, tolerating a bounded number of consecutive reads that produce no
//! data (a read timeout on the stream surfaces as one).

use std::io::{ErrorKind, Read, Write};

use crate::byte_order::ByteOrder;
use crate::error::{FrameError, Result};

/// Bytes staged per write or read when elements are reversed.
pub const SCRATCH_SIZE: usize = 1024;

const MAX_ELEMENT_WIDTH: usize = 8;

/// Width of the elements of a byte range that needs reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementWidth {
    Four,
    Eight,
}

impl ElementWidth {
    pub const fn bytes(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
}

/// Write `bytes` with one call.
pub fn send_direct<W: Write>(dst: &mut W, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    loop {
        match dst.write(bytes) {
            Ok(n) if n == bytes.len() => return Ok(()),
            Ok(written) => {
                return Err(FrameError::ShortWrite {
                    written,
                    expected: bytes.len(),
                })
            }
            // Nothing was written; the call can be repeated as is.
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Write `bytes` with every element reversed, staging through a scratch buffer.
pub fn send_swapped<W: Write>(dst: &mut W, bytes: &[u8], width: ElementWidth) -> Result<()> {
    check_aligned(bytes.len(), width)?;
    let w = width.bytes();
    let mut scratch = [0u8; SCRATCH_SIZE + MAX_ELEMENT_WIDTH];
    let mut filled = 0;

    for element in bytes.chunks_exact(w) {
        let slot = &mut scratch[filled..filled + w];
        slot.copy_from_slice(element);
        slot.reverse();
        filled += w;
        if filled >= SCRATCH_SIZE {
            send_direct(dst, &scratch[..filled])?;
            filled = 0;
        }
    }
    send_direct(dst, &scratch[..filled])
}

/// Write elements in wire order: reversed if `order` requires it.
pub fn send_elements<W: Write>(
    dst: &mut W,
    bytes: &[u8],
    width: ElementWidth,
    order: ByteOrder,
) -> Result<()> {
    if order.swap_needed() {
        send_swapped(dst, bytes, width)
    } else {
        check_aligned(bytes.len(), width)?;
        send_direct(dst, bytes)
    }
}

/// Fill `dst` exactly from `src`.
pub fn receive_direct<R: Read>(src: &mut R, dst: &mut [u8], stall_limit: u32) -> Result<()> {
    let mut progress = Progress::new(dst.len() as u64, stall_limit);
    let mut filled = 0;
    while filled < dst.len() {
        filled += progress.read(src, &mut dst[filled..])?;
    }
    Ok(())
}

/// Fill `dst` exactly from `src`, reversing every element.
///
/// An element may arrive split across two reads; its leading bytes are kept
/// in the scratch buffer until the rest shows up.
pub fn receive_swapped<R: Read>(
    src: &mut R,
    dst: &mut [u8],
    width: ElementWidth,
    stall_limit: u32,
) -> Result<()> {
    check_aligned(dst.len(), width)?;
    let w = width.bytes();
    let mut scratch = [0u8; SCRATCH_SIZE + MAX_ELEMENT_WIDTH];
    let mut progress = Progress::new(dst.len() as u64, stall_limit);
    let mut carried = 0;
    let mut written = 0;

    while written < dst.len() {
        let want = (dst.len() - written - carried).min(SCRATCH_SIZE);
        let available = carried + progress.read(src, &mut scratch[carried..carried + want])?;
        let whole = available - available % w;

        for element in scratch[..whole].chunks_exact(w) {
            let slot = &mut dst[written..written + w];
            slot.copy_from_slice(element);
            slot.reverse();
            written += w;
        }
        scratch.copy_within(whole..available, 0);
        carried = available - whole;
    }
    Ok(())
}

/// Read elements stored in wire order: reversed if `order` requires it.
pub fn receive_elements<R: Read>(
    src: &mut R,
    dst: &mut [u8],
    width: ElementWidth,
    order: ByteOrder,
    stall_limit: u32,
) -> Result<()> {
    if order.swap_needed() {
        receive_swapped(src, dst, width, stall_limit)
    } else {
        check_aligned(dst.len(), width)?;
        receive_direct(src, dst, stall_limit)
    }
}

/// Read and discard exactly `count` bytes.
pub fn skip<R: Read>(src: &mut R, count: u64, stall_limit: u32) -> Result<()> {
    let mut scratch = [0u8; SCRATCH_SIZE];
    let mut progress = Progress::new(count, stall_limit);
    let mut remaining = count;
    while remaining > 0 {
        let want = remaining.min(SCRATCH_SIZE as u64) as usize;
        remaining -= progress.read(src, &mut scratch[..want])? as u64;
    }
    Ok(())
}

pub(crate) fn check_aligned(len: usize, width: ElementWidth) -> Result<()> {
    if len % width.bytes() != 0 {
        return Err(FrameError::Misaligned {
            len: len as u64,
            width: width.bytes(),
        });
    }
    Ok(())
}

/// Byte accounting and the zero-data counter for one receive call.
struct Progress {
    expected: u64,
    received: u64,
    idle: u32,
    stall_limit: u32,
}

impl Progress {
    fn new(expected: u64, stall_limit: u32) -> Self {
        Self {
            expected,
            received: 0,
            idle: 0,
            stall_limit,
        }
    }

    /// Read at least one byte into the non-empty `buf`.
    fn read<R: Read>(&mut self, src: &mut R, buf: &mut [u8]) -> Result<usize> {
        loop {
            match src.read(buf) {
                Ok(0) => {
                    return Err(FrameError::ConnectionClosed {
                        received: self.received,
                        expected: self.expected,
                    })
                }
                Ok(n) => {
                    self.idle = 0;
                    self.received += n as u64;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    self.idle += 1;
                    if self.idle > self.stall_limit {
                        return Err(FrameError::StalledConnection {
                            received: self.received,
                            expected: self.expected,
                        });
                    }
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}
