//! RelayBoardBuilder -- fluent builder for constructing [`RelayBoard`] instances.
//!
//! Building does not touch the network: the board is connected to once per
//! command, so the builder only collects addresses and timeouts and checks
//! that they make sense.
//!
//! # Example
//!
//! ```no_run
//! use relaylib_waveshare::builder::RelayBoardBuilder;
//! use relaylib_core::{RelayAction, RelayIndex};
//! use std::time::Duration;
//!
//! # async fn example() -> relaylib_core::Result<()> {
//! let mut board = RelayBoardBuilder::new()
//!     .host("192.168.1.200".parse().unwrap())
//!     .command_timeout(Duration::from_millis(800))
//!     .build()?;
//! board.toggle_relay(RelayIndex::new(0), RelayAction::On).await?;
//! # Ok(())
//! # }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use relaylib_core::error::{Error, Result};
use relaylib_core::transport::Connector;
use relaylib_transport::{DEFAULT_CONNECT_TIMEOUT, TcpConnector};

use crate::board::RelayBoard;
use crate::commands::PulseEncoding;
use crate::discovery::DiscoveryConfig;

/// TCP port the board accepts commands on.
pub const DEFAULT_PORT: u16 = 4196;

/// Time allowed for a checksum-valid reply to arrive.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Where the board is, as far as the builder knows.
#[derive(Debug, Clone, Copy)]
enum Target {
    Discover,
    Host(IpAddr),
    Address(SocketAddr),
}

/// Fluent builder for [`RelayBoard`].
///
/// With no host or address set, every command discovers the board over UDP
/// broadcast first:
///
/// ```ignore
/// let board = RelayBoardBuilder::new().build()?;
/// ```
pub struct RelayBoardBuilder {
    target: Target,
    port: u16,
    command_timeout: Duration,
    connect_timeout: Duration,
    pulse_encoding: PulseEncoding,
    discovery: DiscoveryConfig,
}

impl RelayBoardBuilder {
    pub fn new() -> Self {
        RelayBoardBuilder {
            target: Target::Discover,
            port: DEFAULT_PORT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pulse_encoding: PulseEncoding::default(),
            discovery: DiscoveryConfig::default(),
        }
    }

    /// Board IP address; the command port comes from [`port()`](Self::port).
    pub fn host(mut self, ip: IpAddr) -> Self {
        self.target = Target::Host(ip);
        self
    }

    /// Full board address. Overrides [`port()`](Self::port).
    pub fn address(mut self, addr: SocketAddr) -> Self {
        self.target = Target::Address(addr);
        self
    }

    /// Command port (default: 4196).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the timeout for a single command's reply (default: 1s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long discovery waits for an answer (default: 3s).
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery.timeout = timeout;
        self
    }

    /// Where the discovery probe is sent (default: `255.255.255.255:1092`).
    pub fn discovery_target(mut self, target: SocketAddr) -> Self {
        self.discovery.target = target;
        self
    }

    /// Replace the discovery probe payload.
    pub fn discovery_probe(mut self, probe: &[u8]) -> Self {
        self.discovery.probe = probe.to_vec();
        self
    }

    /// Choose how pulse durations are encoded; see [`PulseEncoding`].
    pub fn pulse_encoding(mut self, encoding: PulseEncoding) -> Self {
        self.pulse_encoding = encoding;
        self
    }

    /// Build a [`RelayBoard`] with a caller-provided connector.
    ///
    /// This is the entry point for tests (pass a `MockConnector` from
    /// `relaylib-test-harness`) and for callers that open connections some
    /// other way.
    pub fn build_with_connector(self, connector: Box<dyn Connector>) -> Result<RelayBoard> {
        for (name, value) in [
            ("command_timeout", self.command_timeout),
            ("connect_timeout", self.connect_timeout),
            ("discovery_timeout", self.discovery.timeout),
        ] {
            if value.is_zero() {
                return Err(Error::InvalidParameter(format!("{} must be non-zero", name)));
            }
        }
        if self.discovery.probe.is_empty() {
            return Err(Error::InvalidParameter(
                "discovery probe must not be empty".into(),
            ));
        }

        let address = match self.target {
            Target::Discover => None,
            Target::Host(ip) => Some(SocketAddr::new(ip, self.port)),
            Target::Address(addr) => Some(addr),
        };

        Ok(RelayBoard::new(
            connector,
            address,
            self.port,
            self.command_timeout,
            self.connect_timeout,
            self.pulse_encoding,
            self.discovery,
        ))
    }

    /// Build a [`RelayBoard`] that talks TCP.
    pub fn build(self) -> Result<RelayBoard> {
        self.build_with_connector(Box::new(TcpConnector::new()))
    }
}

impl Default for RelayBoardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_PROBE};
    use relaylib_test_harness::MockConnector;

    #[test]
    fn builder_defaults() {
        let board = RelayBoardBuilder::new().build().unwrap();
        assert_eq!(board.address(), None);
        assert_eq!(board.port(), DEFAULT_PORT);
        assert_eq!(board.command_timeout(), Duration::from_secs(1));
        assert_eq!(board.connect_timeout(), Duration::from_secs(5));
        assert_eq!(board.pulse_encoding(), PulseEncoding::DecimalAsHex);
        assert_eq!(board.discovery_config().timeout, DEFAULT_DISCOVERY_TIMEOUT);
        assert_eq!(board.discovery_config().probe, DEFAULT_PROBE);
    }

    #[test]
    fn host_uses_configured_port() {
        let board = RelayBoardBuilder::new()
            .host("10.0.0.7".parse().unwrap())
            .port(502)
            .build()
            .unwrap();
        assert_eq!(board.address(), Some("10.0.0.7:502".parse().unwrap()));
    }

    #[test]
    fn address_overrides_port() {
        let board = RelayBoardBuilder::new()
            .port(502)
            .address("10.0.0.7:4196".parse().unwrap())
            .build()
            .unwrap();
        assert_eq!(board.address(), Some("10.0.0.7:4196".parse().unwrap()));
    }

    #[test]
    fn custom_settings_reach_the_board() {
        let board = RelayBoardBuilder::new()
            .command_timeout(Duration::from_millis(250))
            .connect_timeout(Duration::from_millis(750))
            .discovery_timeout(Duration::from_millis(500))
            .discovery_target("192.168.1.255:1092".parse().unwrap())
            .discovery_probe(b"SEARCH")
            .pulse_encoding(PulseEncoding::Binary)
            .build_with_connector(Box::new(MockConnector::new()))
            .unwrap();

        assert_eq!(board.command_timeout(), Duration::from_millis(250));
        assert_eq!(board.connect_timeout(), Duration::from_millis(750));
        assert_eq!(board.pulse_encoding(), PulseEncoding::Binary);
        let discovery = board.discovery_config();
        assert_eq!(discovery.timeout, Duration::from_millis(500));
        assert_eq!(discovery.target, "192.168.1.255:1092".parse().unwrap());
        assert_eq!(discovery.probe, b"SEARCH");
    }

    #[test]
    fn zero_timeouts_rejected() {
        let builders = [
            RelayBoardBuilder::new().command_timeout(Duration::ZERO),
            RelayBoardBuilder::new().connect_timeout(Duration::ZERO),
            RelayBoardBuilder::new().discovery_timeout(Duration::ZERO),
        ];
        for builder in builders {
            let err = builder.build().err().unwrap();
            assert!(matches!(err, Error::InvalidParameter(_)), "got: {:?}", err);
        }
    }

    #[test]
    fn empty_probe_rejected() {
        let err = RelayBoardBuilder::new()
            .discovery_probe(&[])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }
}
