//! relaylib-core: Core traits, types, and error definitions for relaylib.
//!
//! This crate defines the board-agnostic abstractions the relay drivers are
//! built on. Applications that trigger relay commands depend on these types
//! without pulling in a specific transport.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Connector`] -- opens one fresh [`Transport`] per command
//! - [`RelayIndex`] / [`RelayAction`] -- what a command addresses and does
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use transport::{Connector, Transport};
pub use types::*;
