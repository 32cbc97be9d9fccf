//! Transport and connector traits for board communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to a relay board.
//! [`Connector`] opens a fresh transport to a given address; the command
//! layer asks it for one connection per command and closes that connection
//! before returning, so no socket outlives a single exchange.
//!
//! Protocol code operates on these traits rather than on a `TcpStream`,
//! which lets the same exchange loop run against real hardware and against
//! the scripted `MockTransport` from `relaylib-test-harness`.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a board.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the board.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying socket.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the board into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    /// Closing an already-closed transport is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}

/// Opens a new [`Transport`] for each command.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `addr`, waiting at most `timeout` for the connection to
    /// be established.
    async fn connect(&self, addr: SocketAddr, timeout: Duration) -> Result<Box<dyn Transport>>;
}
