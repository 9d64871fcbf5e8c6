//! Zone addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Number of keypad rows (one per stacked amplifier unit).
pub const ZONE_ROWS: u8 = 3;

/// Number of zones on each amplifier unit.
pub const ZONE_COLUMNS: u8 = 6;

/// Address of one zone, encoded as `10 * row + col`.
///
/// Rows run from 1 to 3 (one per chained amplifier) and columns from 1 to 6,
/// so the valid addresses are 11-16, 21-26 and 31-36. A `ZoneId` only says
/// the address is well formed; whether a zone is populated is decided by
/// discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ZoneId(u8);

impl ZoneId {
    /// Validate and wrap a zone address.
    pub fn new(value: u8) -> ProtocolResult<ZoneId> {
        let row = value / 10;
        let col = value % 10;
        if (1..=ZONE_ROWS).contains(&row) && (1..=ZONE_COLUMNS).contains(&col) {
            Ok(ZoneId(value))
        } else {
            Err(ProtocolError::InvalidZoneId(value))
        }
    }

    /// The numeric address.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Amplifier unit (1-3).
    pub const fn row(self) -> u8 {
        self.0 / 10
    }

    /// Zone on the unit (1-6).
    pub const fn col(self) -> u8 {
        self.0 % 10
    }

    /// All 18 candidate addresses in ascending order.
    pub fn candidates() -> impl Iterator<Item = ZoneId> {
        (1..=ZONE_ROWS).flat_map(|row| (1..=ZONE_COLUMNS).map(move |col| ZoneId(10 * row + col)))
    }
}

impl TryFrom<u8> for ZoneId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ZoneId::new(value)
    }
}

impl From<ZoneId> for u8 {
    fn from(id: ZoneId) -> u8 {
        id.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ZoneId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u8 = s.trim().parse().map_err(|_| ProtocolError::Syntax {
            field: "zone",
            text: s.to_string(),
        })?;
        ZoneId::new(value)
    }
}
