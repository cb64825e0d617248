//! The `doTests` interoperability sequence shared by `client` and `serve`.
//!
//! After the text `doTests` the client sends eight chars `a..h`, the integers
//! `0..10` and the doubles `0.0..=10.0`. A server of any implementation reads
//! them back with typed reads and compares.

use std::io::{Read, Write};

use sbp::frame::Result;
use sbp::{MessageReader, MessageWriter};
use tracing::{debug, warn};

pub const TRIGGER: &str = "doTests";

pub const CHARS: [u8; 8] = *b"abcdefgh";

pub fn ints() -> [i32; 10] {
    std::array::from_fn(|i| i as i32)
}

pub fn doubles() -> [f64; 11] {
    std::array::from_fn(|i| i as f64)
}

/// Outcome of checking one received sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub chars_ok: bool,
    pub chars_truncated: bool,
    pub ints_ok: bool,
    pub doubles_ok: bool,
}

impl Report {
    pub fn passed(&self) -> bool {
        self.chars_ok && !self.chars_truncated && self.ints_ok && self.doubles_ok
    }
}

/// Send the trigger followed by the three typed messages.
pub fn send<W: Write>(writer: &mut MessageWriter<W>) -> Result<()> {
    writer.send_chars(TRIGGER)?;
    debug!("sent {TRIGGER}");
    writer.send_chars(CHARS)?;
    debug!("sent c8");
    writer.send_i32s(&ints())?;
    debug!("sent i10");
    writer.send_f64s(&doubles())?;
    debug!("sent d11");
    Ok(())
}

/// Read and check the three typed messages that follow a received trigger.
pub fn verify<R: Read>(reader: &mut MessageReader<R>) -> Result<Report> {
    let mut chars = [0u8; 8];
    let read = reader.read_chars(&mut chars)?;
    let chars_ok = read.len == CHARS.len() && chars == CHARS;
    if !chars_ok {
        warn!(received = ?&chars[..read.len], "unexpected chars");
    }

    let mut got_ints = [0i32; 10];
    reader.read_i32s(&mut got_ints)?;
    let ints_ok = got_ints == ints();
    if !ints_ok {
        warn!(received = ?got_ints, "unexpected ints");
    }

    let mut got_doubles = [0f64; 11];
    reader.read_f64s(&mut got_doubles)?;
    let doubles_ok = got_doubles == doubles();
    if !doubles_ok {
        warn!(received = ?got_doubles, "unexpected doubles");
    }

    Ok(Report {
        chars_ok,
        chars_truncated: read.truncated,
        ints_ok,
        doubles_ok,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use sbp::{ByteOrder, FrameError, Message};

    use super::*;

    #[test]
    fn sequence_verifies_in_both_byte_orders() {
        for order in [ByteOrder::with_swap(false), ByteOrder::with_swap(true)] {
            let mut writer = MessageWriter::new(Vec::new(), order);
            send(&mut writer).unwrap();

            let mut reader = MessageReader::new(Cursor::new(writer.into_inner()), order);
            assert_eq!(reader.read_message().unwrap(), Message::text(TRIGGER));
            let report = verify(&mut reader).unwrap();
            assert!(report.passed(), "{report:?}");
        }
    }

    #[test]
    fn wrong_values_fail_the_report() {
        let order = ByteOrder::detect();
        let mut writer = MessageWriter::new(Vec::new(), order);
        writer.send_chars("abcdefgX").unwrap();
        writer.send_i32s(&ints()).unwrap();
        writer.send_f64s(&[0.0; 11]).unwrap();

        let mut reader = MessageReader::new(Cursor::new(writer.into_inner()), order);
        let report = verify(&mut reader).unwrap();
        assert_eq!(
            report,
            Report {
                chars_ok: false,
                chars_truncated: false,
                ints_ok: true,
                doubles_ok: false,
            }
        );
    }

    #[test]
    fn wrong_shape_is_an_error() {
        let order = ByteOrder::detect();
        let mut writer = MessageWriter::new(Vec::new(), order);
        writer.send_chars(CHARS).unwrap();
        writer.send_i32s(&[1, 2, 3]).unwrap();

        let mut reader = MessageReader::new(Cursor::new(writer.into_inner()), order);
        let err = verify(&mut reader).unwrap_err();
        assert!(matches!(err, FrameError::LengthMismatch { .. }));
    }
}
