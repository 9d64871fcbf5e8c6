//! Error taxonomy for amplifier operations.

use std::io;

use monoprice_protocol::{ProtocolError, ZoneId};
use thiserror::Error;

/// Errors that can occur while talking to the amplifier.
#[derive(Debug, Error)]
pub enum AmpError {
    /// No data reply for this address: the zone is not populated.
    #[error("invalid zone: {0}")]
    InvalidZone(ZoneId),

    /// The zone exists but repeatedly failed to report its state.
    #[error("unknown state for zone {0}")]
    UnknownState(ZoneId),

    /// The amplifier answered with `Command Error.`.
    #[error("command rejected by amplifier: {command}")]
    CommandError { command: String },

    /// The echo or reply did not match what was sent.
    #[error("invalid response: expected {expected:?}, got {got:?}")]
    InvalidResponse { expected: String, got: String },

    /// No complete reply within the transaction timeout.
    #[error("read timeout")]
    ReadTimeout,

    /// The command could not be written within the transaction timeout.
    #[error("write timeout")]
    WriteTimeout,

    /// The amplifier kept answering with empty lines.
    #[error("retries exceeded after {attempts} attempts")]
    RetriesExceeded { attempts: u32 },

    /// The underlying serial stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The serial stream was closed.
    #[error("end of stream")]
    EndOfStream,

    /// Framing or codec failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transaction engine is no longer running.
    #[error("transaction engine closed")]
    EngineClosed,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for amplifier operations.
pub type AmpResult<T> = Result<T, AmpError>;

/// Coarse error class for collaborators that report status codes
/// (an HTTP layer maps these to 404/400/503/500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    NotFound,
    BadRequest,
    ServiceUnavailable,
    Internal,
}

impl AmpError {
    /// Deterministic status class for this error.
    pub fn status_class(&self) -> StatusClass {
        match self {
            AmpError::InvalidZone(_) => StatusClass::NotFound,
            AmpError::Protocol(
                ProtocolError::InvalidArgument { .. }
                | ProtocolError::InvalidZoneId(_)
                | ProtocolError::UnknownCommand(_),
            ) => StatusClass::BadRequest,
            AmpError::UnknownState(_)
            | AmpError::ReadTimeout
            | AmpError::WriteTimeout
            | AmpError::RetriesExceeded { .. }
            | AmpError::EngineClosed => StatusClass::ServiceUnavailable,
            _ => StatusClass::Internal,
        }
    }

    /// Short snake_case name, used as a metric label and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AmpError::InvalidZone(_) => "invalid_zone",
            AmpError::UnknownState(_) => "unknown_state",
            AmpError::CommandError { .. } => "command_error",
            AmpError::InvalidResponse { .. } => "invalid_response",
            AmpError::ReadTimeout => "read_timeout",
            AmpError::WriteTimeout => "write_timeout",
            AmpError::RetriesExceeded { .. } => "retries_exceeded",
            AmpError::Transport(_) => "transport",
            AmpError::EndOfStream => "end_of_stream",
            AmpError::Protocol(_) => "protocol",
            AmpError::EngineClosed => "engine_closed",
            AmpError::Config(_) => "config",
        }
    }

    /// Whether the transaction was abandoned for lack of an answer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AmpError::ReadTimeout | AmpError::WriteTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ZoneId {
        ZoneId::new(11).unwrap()
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(AmpError::InvalidZone(zone()).status_class(), StatusClass::NotFound);
        assert_eq!(AmpError::UnknownState(zone()).status_class(), StatusClass::ServiceUnavailable);
        assert_eq!(AmpError::ReadTimeout.status_class(), StatusClass::ServiceUnavailable);
        assert_eq!(
            AmpError::RetriesExceeded { attempts: 3 }.status_class(),
            StatusClass::ServiceUnavailable
        );
        assert_eq!(
            AmpError::Protocol(ProtocolError::UnknownCommand("xx".into())).status_class(),
            StatusClass::BadRequest
        );
        assert_eq!(
            AmpError::Protocol(ProtocolError::TooLong).status_class(),
            StatusClass::Internal
        );
        assert_eq!(
            AmpError::CommandError { command: "<11PR01".into() }.status_class(),
            StatusClass::Internal
        );
        assert_eq!(AmpError::EndOfStream.status_class(), StatusClass::Internal);
    }

    #[test]
    fn test_conversions() {
        let err: AmpError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert_eq!(err.kind(), "transport");

        let err: AmpError = ProtocolError::UnexpectedEndOfInput.into();
        assert_eq!(err.to_string(), "unexpected end of input");
    }

    #[test]
    fn test_timeouts() {
        assert!(AmpError::ReadTimeout.is_timeout());
        assert!(AmpError::WriteTimeout.is_timeout());
        assert!(!AmpError::EndOfStream.is_timeout());
    }
}
