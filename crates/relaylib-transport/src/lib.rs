//! Transport implementations for relaylib.
//!
//! This crate provides concrete implementations of the
//! [`Transport`](relaylib_core::Transport) and
//! [`Connector`](relaylib_core::Connector) traits from `relaylib-core`:
//!
//! - [`TcpTransport`]: one TCP connection to a relay board
//! - [`TcpConnector`]: opens a new `TcpTransport` for every command
//! - [`UdpTransport`]: UDP datagrams for broadcast board discovery

pub mod tcp;
pub mod udp;

pub use tcp::{DEFAULT_CONNECT_TIMEOUT, TcpConnector, TcpTransport};
pub use udp::UdpTransport;
