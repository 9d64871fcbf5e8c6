//! Fixed-width zone status record.
//!
//! A full-state query is answered with a data line whose payload is a run of
//! two-character fields in a fixed order:
//!
//! ```text
//! zone pa power mute dnd volume treble bass balance source keypad
//!  11  00  01    00   00   13     11    12    10      04     01
//! ```
//!
//! Integer fields are zero-padded decimal. Boolean fields are `00` or `01`;
//! a non-zero leading digit is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::types::ZoneId;

/// Width of every field in the status record.
pub const FIELD_WIDTH: usize = 2;

/// Field names in wire order.
pub const FIELDS: [&str; 11] = [
    "zone",
    "pa",
    "power",
    "mute",
    "do_not_disturb",
    "volume",
    "treble",
    "bass",
    "balance",
    "source",
    "keypad",
];

/// Length of an encoded status record.
pub const PAYLOAD_LEN: usize = FIELD_WIDTH * FIELDS.len();

/// Status snapshot of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Zone the snapshot belongs to.
    pub zone: ZoneId,
    /// Public address (paging) active.
    pub pa: bool,
    pub power: bool,
    pub mute: bool,
    pub do_not_disturb: bool,
    /// Volume, 0-38.
    pub volume: u8,
    /// Treble, 0-14 (7 is flat).
    pub treble: u8,
    /// Bass, 0-14 (7 is flat).
    pub bass: u8,
    /// Balance, 0-20 (10 is centre).
    pub balance: u8,
    /// Selected source, 1-6.
    pub source: u8,
    /// Keypad connected/locked.
    pub keypad: bool,
}

/// Walks a payload two bytes at a time.
struct FieldReader<'a> {
    rest: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn take(&mut self) -> ProtocolResult<&'a [u8]> {
        if self.rest.len() < FIELD_WIDTH {
            return Err(ProtocolError::UnexpectedEndOfInput);
        }
        let (field, rest) = self.rest.split_at(FIELD_WIDTH);
        self.rest = rest;
        Ok(field)
    }

    fn int(&mut self, field: &'static str) -> ProtocolResult<u8> {
        let raw = self.take()?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| syntax(field, raw))
    }

    fn bool(&mut self, field: &'static str) -> ProtocolResult<bool> {
        let raw = self.take()?;
        match raw {
            [b'0', b'0'] => Ok(false),
            [b'0', b'1'] => Ok(true),
            _ => Err(syntax(field, raw)),
        }
    }

    fn finish(self) -> ProtocolResult<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::TooLong)
        }
    }
}

fn syntax(field: &'static str, raw: &[u8]) -> ProtocolError {
    ProtocolError::Syntax {
        field,
        text: String::from_utf8_lossy(raw).into_owned(),
    }
}

fn encode_bool(out: &mut String, value: bool) {
    out.push_str(if value { "01" } else { "00" });
}

fn encode_int(out: &mut String, value: u8) {
    use std::fmt::Write;
    // Writing to a String cannot fail.
    let _ = write!(out, "{:02}", value);
}

impl State {
    /// Decode a status payload (the data line without its `>` marker).
    pub fn decode(payload: &str) -> ProtocolResult<State> {
        let mut reader = FieldReader {
            rest: payload.as_bytes(),
        };

        let zone = reader.int("zone")?;
        let zone = ZoneId::new(zone)?;
        let state = State {
            zone,
            pa: reader.bool("pa")?,
            power: reader.bool("power")?,
            mute: reader.bool("mute")?,
            do_not_disturb: reader.bool("do_not_disturb")?,
            volume: reader.int("volume")?,
            treble: reader.int("treble")?,
            bass: reader.int("bass")?,
            balance: reader.int("balance")?,
            source: reader.int("source")?,
            keypad: reader.bool("keypad")?,
        };
        reader.finish()?;
        Ok(state)
    }

    /// Encode the record in wire order.
    ///
    /// Integer fields above 99 do not fit the format; keeping them in range
    /// is the caller's job.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(PAYLOAD_LEN);
        encode_int(&mut out, self.zone.get());
        encode_bool(&mut out, self.pa);
        encode_bool(&mut out, self.power);
        encode_bool(&mut out, self.mute);
        encode_bool(&mut out, self.do_not_disturb);
        encode_int(&mut out, self.volume);
        encode_int(&mut out, self.treble);
        encode_int(&mut out, self.bass);
        encode_int(&mut out, self.balance);
        encode_int(&mut out, self.source);
        encode_bool(&mut out, self.keypad);
        out
    }
}

impl FromStr for State {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::decode(s)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
