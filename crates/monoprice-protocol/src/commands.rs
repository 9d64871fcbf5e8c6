//! Command table and request encoding.
//!
//! Every command is a two-letter mnemonic followed by an optional argument:
//!
//! - **Query**: `?{zone}` asks for the full status record of a zone
//! - **Set**: `<{zone}{mnemonic}{arg}` changes one attribute, e.g. `<11VO20`
//!
//! Arguments are always two decimal digits. Booleans are `00`/`01`.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::ZoneId;

/// Direction of a request, which selects its prefix character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Inquiry (`?`), answered with a data line.
    Query,
    /// Control command (`<`), acknowledged by its echo.
    Set,
}

impl Direction {
    /// Prefix character on the wire.
    pub const fn prefix(self) -> char {
        match self {
            Direction::Query => '?',
            Direction::Set => '<',
        }
    }

    /// Lowercase name used in logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Query => "query",
            Direction::Set => "set",
        }
    }
}

/// How a command's argument is written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgFormat {
    /// The command takes no argument.
    None,
    /// `00` or `01`.
    Bool,
    /// Two-digit zero-padded decimal within `min..=max`.
    Level { min: u8, max: u8 },
}

/// Commands understood by the amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Public address (`PA`)
    PublicAddress,
    /// Zone power (`PR`)
    Power,
    /// Mute (`MU`)
    Mute,
    /// Do not disturb (`DT`)
    DoNotDisturb,
    /// Volume (`VO`)
    Volume,
    /// Treble (`TR`)
    Treble,
    /// Bass (`BS`)
    Bass,
    /// Balance (`BL`)
    Balance,
    /// Source/channel (`CH`)
    Source,
    /// Keypad status (`LS`)
    KeypadStatus,
    /// Full status record (`ST`). Never sent on the wire: a bare `?{zone}`
    /// already asks for the complete state.
    State,
}

impl Command {
    /// Every command in the table.
    pub const ALL: [Command; 11] = [
        Command::PublicAddress,
        Command::Power,
        Command::Mute,
        Command::DoNotDisturb,
        Command::Volume,
        Command::Treble,
        Command::Bass,
        Command::Balance,
        Command::Source,
        Command::KeypadStatus,
        Command::State,
    ];

    /// The two-letter wire mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Command::PublicAddress => "PA",
            Command::Power => "PR",
            Command::Mute => "MU",
            Command::DoNotDisturb => "DT",
            Command::Volume => "VO",
            Command::Treble => "TR",
            Command::Bass => "BS",
            Command::Balance => "BL",
            Command::Source => "CH",
            Command::KeypadStatus => "LS",
            Command::State => "ST",
        }
    }

    /// Human-friendly name, matching the status record field names.
    pub const fn name(self) -> &'static str {
        match self {
            Command::PublicAddress => "pa",
            Command::Power => "power",
            Command::Mute => "mute",
            Command::DoNotDisturb => "do_not_disturb",
            Command::Volume => "volume",
            Command::Treble => "treble",
            Command::Bass => "bass",
            Command::Balance => "balance",
            Command::Source => "source",
            Command::KeypadStatus => "keypad",
            Command::State => "state",
        }
    }

    /// Argument rule for this command.
    pub const fn arg_format(self) -> ArgFormat {
        match self {
            Command::Power | Command::Mute | Command::DoNotDisturb => ArgFormat::Bool,
            Command::Volume => ArgFormat::Level { min: 0, max: 38 },
            Command::Treble | Command::Bass => ArgFormat::Level { min: 0, max: 14 },
            Command::Balance => ArgFormat::Level { min: 0, max: 20 },
            Command::Source => ArgFormat::Level { min: 1, max: 6 },
            Command::PublicAddress | Command::KeypadStatus | Command::State => ArgFormat::None,
        }
    }

    /// Format an argument according to [`Command::arg_format`].
    pub fn format_argument(self, arg: Argument) -> ProtocolResult<String> {
        let invalid = |reason: String| ProtocolError::InvalidArgument {
            command: self.mnemonic(),
            reason,
        };

        match (self.arg_format(), arg) {
            (ArgFormat::None, Argument::None) => Ok(String::new()),
            (ArgFormat::Bool, Argument::Bool(b)) => Ok(if b { "01" } else { "00" }.to_string()),
            (ArgFormat::Level { min, max }, Argument::Level(v)) => {
                if (min..=max).contains(&v) {
                    Ok(format!("{:02}", v))
                } else {
                    Err(invalid(format!("{} is outside {}..={}", v, min, max)))
                }
            }
            (ArgFormat::None, other) => Err(invalid(format!("takes no argument, got {}", other))),
            (ArgFormat::Bool, other) => Err(invalid(format!("expected a boolean, got {}", other))),
            (ArgFormat::Level { .. }, other) => {
                Err(invalid(format!("expected a level, got {}", other)))
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    /// Accepts either the field name (`volume`) or the mnemonic (`VO`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Command::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s) || c.mnemonic().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProtocolError::UnknownCommand(s.to_string()))
    }
}

/// A typed command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    None,
    Bool(bool),
    Level(u8),
}

impl Argument {
    /// Parse user text into the argument type `command` expects.
    ///
    /// Booleans accept `on/off`, `true/false` and `1/0`.
    pub fn parse_for(command: Command, text: &str) -> ProtocolResult<Argument> {
        let text = text.trim();
        let invalid = |reason: &str| ProtocolError::InvalidArgument {
            command: command.mnemonic(),
            reason: format!("{}: {:?}", reason, text),
        };

        match command.arg_format() {
            ArgFormat::None if text.is_empty() => Ok(Argument::None),
            ArgFormat::None => Err(invalid("takes no argument")),
            ArgFormat::Bool => match text.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" | "01" => Ok(Argument::Bool(true)),
                "off" | "false" | "0" | "00" => Ok(Argument::Bool(false)),
                _ => Err(invalid("not a boolean")),
            },
            ArgFormat::Level { .. } => text
                .parse::<u8>()
                .map(Argument::Level)
                .map_err(|_| invalid("not a number")),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::None => f.write_str("none"),
            Argument::Bool(b) => write!(f, "{}", b),
            Argument::Level(v) => write!(f, "{}", v),
        }
    }
}

/// A fully formatted request for one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub direction: Direction,
    pub zone: ZoneId,
    pub command: Command,
    /// Already formatted argument digits (may be empty).
    pub argument: String,
}

impl Request {
    /// Full-state query for `zone`.
    pub fn query(zone: ZoneId) -> Request {
        Request {
            direction: Direction::Query,
            zone,
            command: Command::State,
            argument: String::new(),
        }
    }

    /// Control command for `zone`, validating the argument.
    pub fn set(zone: ZoneId, command: Command, argument: Argument) -> ProtocolResult<Request> {
        if command == Command::State {
            return Err(ProtocolError::InvalidArgument {
                command: command.mnemonic(),
                reason: "the state record cannot be set directly".to_string(),
            });
        }
        Ok(Request {
            direction: Direction::Set,
            zone,
            command,
            argument: command.format_argument(argument)?,
        })
    }

    /// Get the command string without the terminator.
    ///
    /// This is also the exact echo the amplifier sends back.
    pub fn to_command_string(&self) -> String {
        let mnemonic = match self.command {
            Command::State => "",
            other => other.mnemonic(),
        };
        format!(
            "{}{}{}{}",
            self.direction.prefix(),
            self.zone,
            mnemonic,
            self.argument
        )
    }
}
