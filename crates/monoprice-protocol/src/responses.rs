//! Classification of lines received after a command echo.
//!
//! Once the echo has been matched, the next line is one of:
//! - Empty: the amplifier dropped the request; the engine resends it
//! - `Command Error.`: the amplifier rejected the command
//! - `>{payload}`: a data reply to a query
//! - anything else

/// Sentinel the amplifier sends when it rejects a command.
pub const COMMAND_ERROR: &str = "Command Error.";

/// Marker that starts a data reply.
pub const DATA_MARKER: char = '>';

/// A framed line received after the echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Nothing but framing on the line.
    Empty,

    /// The amplifier rejected the command.
    CommandError,

    /// A data reply; the `>` marker is stripped.
    Data(String),

    /// Unknown/unrecognized line.
    Unknown(String),
}

impl Response {
    /// Parse a framed line (see [`crate::frame_line`]).
    pub fn parse(line: &str) -> Response {
        let text = line.trim();

        if text.is_empty() {
            return Response::Empty;
        }

        if text.starts_with(COMMAND_ERROR) {
            return Response::CommandError;
        }

        if let Some(payload) = text.strip_prefix(DATA_MARKER) {
            return Response::Data(payload.to_string());
        }

        Response::Unknown(text.to_string())
    }
}
