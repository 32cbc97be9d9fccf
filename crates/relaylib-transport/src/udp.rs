//! UDP transport for board discovery.
//!
//! This module provides [`UdpTransport`], a datagram-oriented socket used
//! to broadcast the discovery probe and collect replies. Unlike
//! [`super::TcpTransport`], it does **not** implement the
//! [`Transport`](relaylib_core::Transport) trait because UDP is
//! connectionless and datagram-based rather than stream-oriented.
//!
//! # Example
//!
//! ```no_run
//! use relaylib_transport::UdpTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> relaylib_core::Result<()> {
//! let transport = UdpTransport::bind("0.0.0.0:0").await?;
//! transport.set_broadcast(true)?;
//!
//! let broadcast_addr = "255.255.255.255:1092".parse().unwrap();
//! transport.send_to(b"probe", broadcast_addr).await?;
//!
//! let mut buf = [0u8; 1024];
//! let (n, src) = transport.recv_from(&mut buf, Duration::from_secs(3)).await?;
//! println!("{} bytes from {}", n, src);
//! # Ok(())
//! # }
//! ```

use relaylib_core::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

/// UDP socket with error mapping consistent with the rest of the
/// transport layer.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying UDP socket.
    socket: UdpSocket,
    /// The local address the socket is bound to.
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address.
    ///
    /// Use `"0.0.0.0:0"` to bind to any available port on all interfaces.
    pub async fn bind(addr: &str) -> Result<Self> {
        tracing::debug!(addr = %addr, "Binding UDP socket");

        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            tracing::error!(addr = %addr, error = %e, "Failed to bind UDP socket");
            Error::Transport(format!("failed to bind UDP socket on {}: {}", addr, e))
        })?;

        let local_addr = socket.local_addr().map_err(|e| {
            tracing::error!(error = %e, "Failed to get local address");
            Error::Io(e)
        })?;

        tracing::debug!(local_addr = %local_addr, "UDP socket bound");

        Ok(Self { socket, local_addr })
    }

    /// Get the local address this socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send `data` as a single datagram to `addr`.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr) -> Result<()> {
        tracing::trace!(
            local = %self.local_addr,
            remote = %addr,
            bytes = data.len(),
            "Sending datagram"
        );

        self.socket.send_to(data, addr).await.map_err(|e| {
            tracing::error!(
                local = %self.local_addr,
                remote = %addr,
                error = %e,
                "Failed to send datagram"
            );
            Error::Io(e)
        })?;

        Ok(())
    }

    /// Receive a datagram with timeout. Returns `(bytes_read, source_addr)`.
    ///
    /// Bytes beyond `buf.len()` are silently discarded (standard UDP
    /// behavior).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no datagram arrives within `timeout`.
    pub async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, SocketAddr)> {
        tracing::trace!(
            local = %self.local_addr,
            buf_len = buf.len(),
            timeout_ms = timeout.as_millis(),
            "Waiting for datagram"
        );

        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(Ok((n, src))) => {
                tracing::trace!(
                    local = %self.local_addr,
                    remote = %src,
                    bytes = n,
                    "Received datagram"
                );
                Ok((n, src))
            }
            Ok(Err(e)) => {
                tracing::error!(
                    local = %self.local_addr,
                    error = %e,
                    "Failed to receive datagram"
                );
                Err(Error::Io(e))
            }
            Err(_) => {
                tracing::trace!(
                    local = %self.local_addr,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for datagram"
                );
                Err(Error::Timeout)
            }
        }
    }

    /// Enable or disable broadcast on this socket.
    ///
    /// Must be enabled before sending to `255.255.255.255`.
    pub fn set_broadcast(&self, enable: bool) -> Result<()> {
        tracing::debug!(local = %self.local_addr, enable = enable, "Setting broadcast");

        self.socket.set_broadcast(enable).map_err(|e| {
            tracing::error!(local = %self.local_addr, error = %e, "Failed to set broadcast");
            Error::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_and_local_addr() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr();

        assert_eq!(addr.ip(), std::net::Ipv4Addr::LOCALHOST);
        assert_ne!(addr.port(), 0, "OS should assign a nonzero port");
    }

    #[tokio::test]
    async fn bind_invalid_address_is_transport_error() {
        let err = UdpTransport::bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)), "got: {:?}", err);
    }

    #[tokio::test]
    async fn recv_from_returns_source() {
        let socket_a = UdpTransport::bind("127.0.0.1:0").await.unwrap();
        let socket_b = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        socket_a
            .send_to(b"probe", socket_b.local_addr())
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (n, src) = socket_b
            .recv_from(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(&buf[..n], b"probe");
        assert_eq!(src, socket_a.local_addr(), "source should be socket A");
    }

    #[tokio::test]
    async fn recv_timeout() {
        let transport = UdpTransport::bind("127.0.0.1:0").await.unwrap();

        let mut buf = [0u8; 64];
        let result = transport
            .recv_from(&mut buf, Duration::from_millis(50))
            .await;

        assert!(
            matches!(result, Err(Error::Timeout)),
            "expected Timeout, got: {:?}",
            result
        );
    }

    #[tokio::test]
    async fn set_broadcast_succeeds() {
        let transport = UdpTransport::bind("0.0.0.0:0").await.unwrap();
        transport.set_broadcast(true).unwrap();
        transport.set_broadcast(false).unwrap();
    }
}
