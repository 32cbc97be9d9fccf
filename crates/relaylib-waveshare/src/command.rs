//! Board commands as values.
//!
//! [`RelayCommand`] is what an external trigger hands to
//! [`RelayBoard::execute`](crate::RelayBoard::execute). Its [`FromStr`]
//! implementation accepts one command per line, so a trigger that reads text
//! from a pipe or socket can pass each line straight through:
//!
//! ```text
//! toggle <index> <on|off|flip>
//! all <on|off|flip>
//! pulse <index> <milliseconds>
//! version
//! discover
//! ```
//!
//! Keywords are case-insensitive; indices accept decimal, `0x` hex, or
//! `all`.

use std::fmt;
use std::str::FromStr;

use relaylib_core::{RelayAction, RelayIndex};

use crate::discovery::DiscoveryReply;

/// One operation on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCommand {
    /// Switch one relay.
    Toggle {
        index: RelayIndex,
        action: RelayAction,
    },
    /// Switch every relay.
    ToggleAll { action: RelayAction },
    /// Close a relay for a while.
    Pulse { index: RelayIndex, on_ms: u32 },
    /// Read the firmware version.
    SwVersion,
    /// Locate the board on the LAN.
    Discover,
}

impl RelayCommand {
    /// The command keyword as written in the line syntax.
    pub fn name(&self) -> &'static str {
        match self {
            RelayCommand::Toggle { .. } => "toggle",
            RelayCommand::ToggleAll { .. } => "all",
            RelayCommand::Pulse { .. } => "pulse",
            RelayCommand::SwVersion => "version",
            RelayCommand::Discover => "discover",
        }
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayCommand::Toggle { index, action } => {
                write!(f, "toggle {} {}", index.index(), action)
            }
            RelayCommand::ToggleAll { action } => write!(f, "all {}", action),
            RelayCommand::Pulse { index, on_ms } => {
                write!(f, "pulse {} {}", index.index(), on_ms)
            }
            RelayCommand::SwVersion => write!(f, "version"),
            RelayCommand::Discover => write!(f, "discover"),
        }
    }
}

/// Error returned when a line cannot be parsed into a [`RelayCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid command: {}", self.0)
    }
}

impl std::error::Error for ParseCommandError {}

impl FromStr for RelayCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        let Some((keyword, args)) = words.split_first() else {
            return Err(ParseCommandError("empty line".into()));
        };

        let command = match (keyword.to_lowercase().as_str(), args) {
            ("toggle", [index, action]) => RelayCommand::Toggle {
                index: parse_index(index)?,
                action: parse_action(action)?,
            },
            ("all", [action]) => RelayCommand::ToggleAll {
                action: parse_action(action)?,
            },
            ("pulse", [index, ms]) => RelayCommand::Pulse {
                index: parse_index(index)?,
                on_ms: ms
                    .parse()
                    .map_err(|_| ParseCommandError(format!("bad pulse duration '{}'", ms)))?,
            },
            ("version", []) => RelayCommand::SwVersion,
            ("discover", []) => RelayCommand::Discover,
            ("toggle" | "all" | "pulse" | "version" | "discover", _) => {
                return Err(ParseCommandError(format!(
                    "wrong number of arguments in '{}'",
                    s.trim()
                )));
            }
            (other, _) => {
                return Err(ParseCommandError(format!("unknown keyword '{}'", other)));
            }
        };
        Ok(command)
    }
}

fn parse_index(s: &str) -> std::result::Result<RelayIndex, ParseCommandError> {
    s.parse()
        .map_err(|e: relaylib_core::ParseRelayIndexError| ParseCommandError(e.to_string()))
}

fn parse_action(s: &str) -> std::result::Result<RelayAction, ParseCommandError> {
    s.parse()
        .map_err(|e: relaylib_core::ParseRelayActionError| ParseCommandError(e.to_string()))
}

/// What [`RelayBoard::execute`](crate::RelayBoard::execute) produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// The board's checksum-valid reply frame.
    Frame(Vec<u8>),
    /// The result of a discovery run.
    Discovered(DiscoveryReply),
}

impl CommandReply {
    /// Flatten to bytes: the reply frame, or the board's IP address as text.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            CommandReply::Frame(bytes) => bytes,
            CommandReply::Discovered(reply) => reply.addr.ip().to_string().into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_each_keyword() {
        assert_eq!(
            "toggle 3 on".parse::<RelayCommand>().unwrap(),
            RelayCommand::Toggle {
                index: RelayIndex::new(3),
                action: RelayAction::On
            }
        );
        assert_eq!(
            "ALL flip".parse::<RelayCommand>().unwrap(),
            RelayCommand::ToggleAll {
                action: RelayAction::Flip
            }
        );
        assert_eq!(
            "  pulse 0x02 1500\n".parse::<RelayCommand>().unwrap(),
            RelayCommand::Pulse {
                index: RelayIndex::new(2),
                on_ms: 1500
            }
        );
        assert_eq!(
            "version".parse::<RelayCommand>().unwrap(),
            RelayCommand::SwVersion
        );
        assert_eq!(
            "Discover".parse::<RelayCommand>().unwrap(),
            RelayCommand::Discover
        );
    }

    #[test]
    fn toggle_all_index_spelling() {
        assert_eq!(
            "toggle all off".parse::<RelayCommand>().unwrap(),
            RelayCommand::Toggle {
                index: RelayIndex::ALL,
                action: RelayAction::Off
            }
        );
    }

    #[test]
    fn parse_errors() {
        let cases = [
            ("", "empty line"),
            ("   ", "empty line"),
            ("toggle 3", "wrong number of arguments"),
            ("version now", "wrong number of arguments"),
            ("reboot", "unknown keyword 'reboot'"),
            ("toggle 300 on", "invalid relay index"),
            ("toggle 3 up", "unknown relay action"),
            ("pulse 1 -5", "bad pulse duration"),
        ];
        for (line, fragment) in cases {
            let err = line.parse::<RelayCommand>().unwrap_err();
            assert!(
                err.to_string().contains(fragment),
                "'{}' gave '{}', expected '{}'",
                line,
                err,
                fragment
            );
        }
    }

    #[test]
    fn display_round_trips_through_parser() {
        let commands = [
            RelayCommand::Toggle {
                index: RelayIndex::new(7),
                action: RelayAction::Off,
            },
            RelayCommand::ToggleAll {
                action: RelayAction::On,
            },
            RelayCommand::Pulse {
                index: RelayIndex::new(1),
                on_ms: 800,
            },
            RelayCommand::SwVersion,
            RelayCommand::Discover,
        ];
        for command in commands {
            assert_eq!(command.to_string().parse::<RelayCommand>().unwrap(), command);
        }
    }

    #[test]
    fn reply_into_bytes() {
        assert_eq!(
            CommandReply::Frame(vec![0x01, 0x05]).into_bytes(),
            vec![0x01, 0x05]
        );
        let discovered = CommandReply::Discovered(DiscoveryReply {
            addr: "192.168.1.200:1092".parse().unwrap(),
            payload: vec![],
            device_id: None,
        });
        assert_eq!(discovered.into_bytes(), b"192.168.1.200".to_vec());
    }
}
