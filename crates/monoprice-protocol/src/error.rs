//! Error types for the amplifier protocol.

use thiserror::Error;

/// Errors produced while framing, encoding or decoding protocol data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Characters remained after every state field was consumed.
    #[error("string is too long")]
    TooLong,

    /// The payload ended before every state field was consumed.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,

    /// A two-character field could not be parsed.
    #[error("invalid syntax in field {field}: {text:?}")]
    Syntax {
        /// Name of the field being decoded.
        field: &'static str,
        /// The offending characters.
        text: String,
    },

    /// A number is not a valid `10 * row + col` zone address.
    #[error("invalid zone id: {0}")]
    InvalidZoneId(u8),

    /// A command argument does not fit the command's formatting rule.
    #[error("invalid argument for {command}: {reason}")]
    InvalidArgument {
        /// Mnemonic of the command.
        command: &'static str,
        /// What is wrong with the argument.
        reason: String,
    },

    /// A command name or mnemonic is not in the command table.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A received line exceeded the framer's buffer.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
