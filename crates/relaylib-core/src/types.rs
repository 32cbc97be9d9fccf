//! Core types used throughout relaylib.
//!
//! These describe what a relay command addresses and what it does, without
//! reference to any particular wire encoding.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Index of a relay channel on the board.
///
/// Any byte value is a valid index. [`RelayIndex::ALL`] (0xFF) is reserved
/// by the board to address every channel at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelayIndex(u8);

impl RelayIndex {
    /// Broadcast index: the command applies to all relays on the board.
    pub const ALL: RelayIndex = RelayIndex(0xFF);

    /// Create a `RelayIndex` from a raw channel number.
    pub fn new(index: u8) -> Self {
        RelayIndex(index)
    }

    /// Return the raw channel number.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// Returns `true` if this is the all-relays broadcast index.
    pub fn is_all(&self) -> bool {
        *self == Self::ALL
    }
}

impl From<u8> for RelayIndex {
    fn from(index: u8) -> Self {
        RelayIndex(index)
    }
}

impl fmt::Display for RelayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "all")
        } else {
            write!(f, "relay-{}", self.0)
        }
    }
}

/// Error returned when a string cannot be parsed into a [`RelayIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRelayIndexError(String);

impl fmt::Display for ParseRelayIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid relay index: '{}'", self.0)
    }
}

impl std::error::Error for ParseRelayIndexError {}

impl FromStr for RelayIndex {
    type Err = ParseRelayIndexError;

    /// Accepts `all`, a decimal channel number (`3`), or a hex byte (`0x03`).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(RelayIndex::ALL);
        }
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => trimmed.parse::<u8>(),
        };
        parsed
            .map(RelayIndex)
            .map_err(|_| ParseRelayIndexError(s.to_string()))
    }
}

/// What a toggle command does to the addressed relay.
///
/// The byte values are fixed by the board firmware; no other values are
/// accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayAction {
    /// Energize the relay.
    On,
    /// De-energize the relay.
    Off,
    /// Invert the relay's current state.
    Flip,
}

impl RelayAction {
    /// Every action, in wire-value order.
    pub const ALL: [RelayAction; 3] = [RelayAction::Off, RelayAction::Flip, RelayAction::On];

    /// The byte sent on the wire for this action.
    pub fn as_byte(self) -> u8 {
        match self {
            RelayAction::On => 0xFF,
            RelayAction::Off => 0x00,
            RelayAction::Flip => 0x55,
        }
    }
}

impl TryFrom<u8> for RelayAction {
    type Error = Error;

    fn try_from(byte: u8) -> std::result::Result<Self, Self::Error> {
        match byte {
            0xFF => Ok(RelayAction::On),
            0x00 => Ok(RelayAction::Off),
            0x55 => Ok(RelayAction::Flip),
            other => Err(Error::InvalidParameter(format!(
                "relay action byte {other:#04X} is not one of ON (0xFF), OFF (0x00), FLIP (0x55)"
            ))),
        }
    }
}

impl fmt::Display for RelayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayAction::On => "ON",
            RelayAction::Off => "OFF",
            RelayAction::Flip => "FLIP",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a string cannot be parsed into a [`RelayAction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRelayActionError(String);

impl fmt::Display for ParseRelayActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown relay action: '{}'", self.0)
    }
}

impl std::error::Error for ParseRelayActionError {}

impl FromStr for RelayAction {
    type Err = ParseRelayActionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(RelayAction::On),
            "off" => Ok(RelayAction::Off),
            "flip" | "toggle" => Ok(RelayAction::Flip),
            _ => Err(ParseRelayActionError(s.to_string())),
        }
    }
}
