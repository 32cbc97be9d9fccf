//! relaylib-test-harness: Test utilities, mock transports, and mock boards
//! for relaylib.
//!
//! This crate provides [`MockTransport`] and [`MockConnector`] for
//! deterministic unit testing of the exchange loop and command facade
//! without a relay board, and [`MockTcpServer`] /
//! [`MockDiscoveryResponder`] for end-to-end tests over loopback sockets.

pub mod mock_tcp;
pub mod mock_transport;

pub use mock_tcp::{MockDiscoveryResponder, MockTcpServer, TcpReply};
pub use mock_transport::{MockConnector, MockTransport, TransportProbe};
