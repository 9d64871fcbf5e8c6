//! Line-based codec for the amplifier's serial interface.
//!
//! Commands are terminated with a carriage return (`\r`). The amplifier
//! answers with lines terminated by `\n` (usually preceded by one or two
//! `\r`), and surrounds them with a `#` prompt character depending on the
//! firmware revision. The codec accumulates bytes, splits them into lines
//! and strips that framing before handing lines to the engine.

use bytes::BytesMut;

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum length of a single received line.
///
/// A full state reply is 23 characters; anything much longer means the
/// stream is garbage or the baud rate is wrong.
pub const MAX_LINE_LENGTH: usize = 128;

/// Terminator appended to every command written to the amplifier.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Byte that ends a received line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Prompt/framing character the amplifier places around lines.
pub const PROMPT: char = '#';

/// Strip whitespace and `#` framing from a raw line.
pub fn frame_line(raw: &str) -> &str {
    let line = raw.trim();
    let line = line.strip_prefix(PROMPT).unwrap_or(line);
    let line = line.strip_suffix(PROMPT).unwrap_or(line);
    line.trim()
}

/// A codec for reading amplifier lines and writing commands.
///
/// Unlike a terminal reader, empty lines are significant: the amplifier
/// sends one when it failed to produce a reply, and the engine retries on it.
#[derive(Debug)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
        }
    }

    /// Add received data to the buffer.
    ///
    /// Fails with [`ProtocolError::BufferOverflow`] when the pending partial
    /// line grows past [`MAX_LINE_LENGTH`]; the buffer is cleared in that case.
    pub fn push(&mut self, data: &[u8]) -> ProtocolResult<()> {
        self.buffer.extend_from_slice(data);

        let pending = match self.buffer.iter().rposition(|&b| b == LINE_TERMINATOR) {
            Some(pos) => self.buffer.len() - pos - 1,
            None => self.buffer.len(),
        };
        if pending > MAX_LINE_LENGTH {
            let actual = pending;
            self.buffer.clear();
            return Err(ProtocolError::BufferOverflow {
                max: MAX_LINE_LENGTH,
                actual,
            });
        }
        Ok(())
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns the line with framing removed, or `None` if no terminator has
    /// been received yet. Empty lines are returned as empty strings.
    pub fn decode_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == LINE_TERMINATOR)?;

        let line_data = self.buffer.split_to(end + 1);
        let raw = String::from_utf8_lossy(&line_data[..end]);
        Some(frame_line(&raw).to_string())
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(COMMAND_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}
