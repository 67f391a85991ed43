//! Line-delimited codec for the textual command protocol.
//!
//! The transport is a raw byte stream, so read boundaries say nothing
//! about command boundaries: a single read may carry half a command or
//! three of them. The decoder buffers bytes and splits on `\n`
//! (tolerating a trailing `\r`), which keeps the textual vocabulary
//! intact while surviving coalesced writes and MTU splitting.
//!
//! A malformed line is logged and dropped; the connection stays open
//! and decoding resumes with the next line.

use bytes::{Buf, BytesMut};
use tracing::warn;

use crate::command::Command;
use crate::error::KioskError;

/// Longest accepted command line, terminator excluded. Anything larger
/// is a protocol violation and fails the connection.
pub const MAX_COMMAND_LEN: usize = 256;

/// [`tokio_util::codec`] implementation for [`Command`] frames.
#[derive(Debug, Default)]
pub struct CommandCodec;

impl tokio_util::codec::Decoder for CommandCodec {
    type Item = Command;
    type Error = KioskError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                if src.len() > MAX_COMMAND_LEN {
                    return Err(KioskError::CommandTooLong {
                        len: src.len(),
                        max: MAX_COMMAND_LEN,
                    });
                }
                return Ok(None);
            };

            let line = src.split_to(pos + 1);
            let line = &line[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            // Blank lines are tolerated as no-ops.
            if line.is_empty() {
                continue;
            }

            let text = match std::str::from_utf8(line) {
                Ok(text) => text,
                Err(_) => {
                    warn!("dropping non-UTF-8 command line ({} bytes)", line.len());
                    continue;
                }
            };

            match Command::parse_wire(text) {
                Ok(cmd) => return Ok(Some(cmd)),
                Err(e) => {
                    warn!("dropping malformed command: {e}");
                    continue;
                }
            }
        }
    }
}

impl tokio_util::codec::Encoder<Command> for CommandCodec {
    type Error = KioskError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let text = item.wire();
        dst.reserve(text.len() + 1);
        dst.extend_from_slice(text.as_bytes());
        dst.extend_from_slice(b"\n");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
