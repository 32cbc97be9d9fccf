//! Driver for Modbus-style Ethernet relay boards.
//!
//! The board speaks a small Modbus RTU dialect over raw TCP: fixed
//! eight-byte requests, replies whose only end marker is a CRC-16/MODBUS
//! that checks out to zero. This crate provides:
//!
//! - **Checksum** ([`crc`]) -- CRC-16/MODBUS and frame completeness.
//! - **Frame builders** ([`commands`]) -- toggle, toggle-all, pulse and
//!   version-read frames, plus reply parsers.
//! - **Exchange** ([`exchange`]) -- send one frame and read the reply byte by
//!   byte under a wall-clock deadline.
//! - **Discovery** ([`discovery`]) -- find the board by UDP broadcast.
//! - **Board facade** ([`board`]) -- [`RelayBoard`], one connection per
//!   command, and [`execute`](RelayBoard::execute) for [`RelayCommand`]s.
//! - **Builder** ([`builder`]) -- [`RelayBoardBuilder`] with defaults.
//!
//! # Example
//!
//! ```
//! use relaylib_core::{RelayAction, RelayIndex};
//! use relaylib_waveshare::commands::cmd_toggle_relay;
//!
//! let frame = cmd_toggle_relay(RelayIndex::ALL, RelayAction::Flip);
//! assert_eq!(frame, vec![0x01, 0x05, 0x00, 0xFF, 0x55, 0x00, 0xC2, 0xAA]);
//! ```

pub mod board;
pub mod builder;
pub mod command;
pub mod commands;
pub mod crc;
pub mod discovery;
pub mod exchange;

pub use board::RelayBoard;
pub use builder::RelayBoardBuilder;
pub use command::{CommandReply, ParseCommandError, RelayCommand};
pub use commands::{PulseEncoding, SwVersion};
pub use discovery::{DiscoveryConfig, DiscoveryReply};
