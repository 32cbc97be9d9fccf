//! LAN discovery of relay boards via UDP broadcast.
//!
//! A board with an unknown IP address answers a search datagram broadcast
//! on its discovery port. The probe is an opaque vendor constant; nothing
//! here decodes it. Whoever answers first is taken to be the board, and its
//! **source address** is the result. The reply payload is kept for
//! diagnostics only.
//!
//! # Usage
//!
//! ```no_run
//! use relaylib_waveshare::discovery::{self, DiscoveryConfig};
//!
//! # async fn example() -> relaylib_core::Result<()> {
//! let reply = discovery::discover(&DiscoveryConfig::default()).await?;
//! println!("board at {}", reply.addr.ip());
//! # Ok(())
//! # }
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use relaylib_core::error::{Error, Result};
use relaylib_transport::UdpTransport;
use tokio::time::Instant;

/// UDP port the board listens on for search datagrams.
pub const DISCOVERY_PORT: u16 = 1092;

/// Search datagram sent when none is configured.
///
/// Boards set up with a different search string can be reached by
/// overriding [`DiscoveryConfig::probe`].
pub const DEFAULT_PROBE: &[u8] = &[0xFF, 0x01, 0x01, 0x02];

/// How long to wait for an answer when none is configured.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Shortest run of identifier characters reported as a device id.
const MIN_DEVICE_ID_LEN: usize = 4;

/// Where and how to search for a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Destination of the probe, normally the limited broadcast address.
    pub target: SocketAddr,
    /// Datagram payload sent as the probe.
    pub probe: Vec<u8>,
    /// Upper bound on the wait for the first reply.
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT)),
            probe: DEFAULT_PROBE.to_vec(),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

/// The first answer to a discovery probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReply {
    /// Source address of the reply datagram. This is the board.
    pub addr: SocketAddr,
    /// Raw reply payload.
    pub payload: Vec<u8>,
    /// Best guess at an identifier embedded in the payload. Advisory only.
    pub device_id: Option<String>,
}

/// Broadcast the probe once and return the first reply.
///
/// # Errors
///
/// [`Error::NotFound`] if nothing answers within `config.timeout`;
/// transport errors if the socket cannot be set up or the probe cannot be
/// sent.
pub async fn discover(config: &DiscoveryConfig) -> Result<DiscoveryReply> {
    let socket = UdpTransport::bind("0.0.0.0:0").await?;
    socket.set_broadcast(true)?;

    let deadline = Instant::now() + config.timeout;

    tracing::debug!(
        target_addr = %config.target,
        probe = ?config.probe,
        timeout_ms = config.timeout.as_millis(),
        "Broadcasting discovery probe"
    );
    socket.send_to(&config.probe, config.target).await?;

    let mut buf = [0u8; 1024];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match socket.recv_from(&mut buf, remaining).await {
            Ok((n, src)) => {
                let payload = buf[..n].to_vec();
                let device_id = advisory_device_id(&payload);
                tracing::info!(
                    addr = %src,
                    device_id = ?device_id,
                    bytes = n,
                    "Relay board answered discovery probe"
                );
                return Ok(DiscoveryReply {
                    addr: src,
                    payload,
                    device_id,
                });
            }
            Err(Error::Timeout) => break,
            Err(e) => {
                // Stray ICMP errors and the like; keep listening.
                tracing::trace!(error = %e, "Discovery recv error");
            }
        }
    }

    tracing::debug!(target_addr = %config.target, "No reply to discovery probe");
    Err(Error::NotFound)
}

/// Pick the longest run of identifier characters (`A-Z`, `a-z`, `0-9`,
/// `-`, `_`) out of a reply payload.
///
/// This is a heuristic over an undocumented payload. It may return `None`
/// or the wrong string and must never decide which address is used.
pub fn advisory_device_id(payload: &[u8]) -> Option<String> {
    payload
        .split(|b| !(b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_'))
        .filter(|run| run.len() >= MIN_DEVICE_ID_LEN)
        .max_by_key(|run| run.len())
        .map(|run| String::from_utf8_lossy(run).into_owned())
}
