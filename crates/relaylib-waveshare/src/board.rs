//! RelayBoard -- the command facade for a networked relay board.
//!
//! Every command follows the same path: encode the request frame, resolve
//! the board's address (configured, or discovered over UDP broadcast), open
//! a fresh connection, run one exchange, close. No connection outlives the
//! command that opened it, and nothing is cached between commands.
//!
//! Methods take `&mut self`, so one owner issues one command at a time. A
//! caller that needs to share a board across tasks wraps it in a mutex.

use std::net::SocketAddr;
use std::time::Duration;

use relaylib_core::error::{Error, Result};
use relaylib_core::transport::Connector;
use relaylib_core::types::{RelayAction, RelayIndex};
use tracing::debug;

use crate::command::{CommandReply, RelayCommand};
use crate::commands::{self, PulseEncoding};
use crate::discovery::{self, DiscoveryConfig, DiscoveryReply};
use crate::exchange;

/// A relay board reached over TCP.
///
/// Constructed via [`RelayBoardBuilder`](crate::builder::RelayBoardBuilder).
/// The reply methods return the board's raw, checksum-valid reply frame;
/// use the parsers in [`commands`] to interpret them.
pub struct RelayBoard {
    connector: Box<dyn Connector>,
    address: Option<SocketAddr>,
    port: u16,
    command_timeout: Duration,
    connect_timeout: Duration,
    pulse_encoding: PulseEncoding,
    discovery: DiscoveryConfig,
}

impl RelayBoard {
    /// Called by [`RelayBoardBuilder`](crate::builder::RelayBoardBuilder);
    /// callers should use the builder API instead.
    pub(crate) fn new(
        connector: Box<dyn Connector>,
        address: Option<SocketAddr>,
        port: u16,
        command_timeout: Duration,
        connect_timeout: Duration,
        pulse_encoding: PulseEncoding,
        discovery: DiscoveryConfig,
    ) -> Self {
        RelayBoard {
            connector,
            address,
            port,
            command_timeout,
            connect_timeout,
            pulse_encoding,
            discovery,
        }
    }

    /// The configured board address, if any. `None` means every command
    /// discovers the board first.
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// TCP port used for commands when the address comes from discovery.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn pulse_encoding(&self) -> PulseEncoding {
        self.pulse_encoding
    }

    pub fn discovery_config(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Switch relay `index` on, off, or flip it.
    pub async fn toggle_relay(&mut self, index: RelayIndex, action: RelayAction) -> Result<Vec<u8>> {
        let frame = commands::cmd_toggle_relay(index, action);
        debug!(%index, %action, "toggle relay");
        self.exchange(&frame).await
    }

    /// Switch every relay at once.
    pub async fn toggle_all_relays(&mut self, action: RelayAction) -> Result<Vec<u8>> {
        let frame = commands::cmd_toggle_all_relays(action);
        debug!(%action, "toggle all relays");
        self.exchange(&frame).await
    }

    /// Close relay `index` for `on_ms` milliseconds; the board opens it
    /// again on its own.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the duration does not fit the pulse
    /// field. No connection is opened in that case.
    pub async fn pulse_relay(&mut self, index: RelayIndex, on_ms: u32) -> Result<Vec<u8>> {
        let frame = commands::cmd_pulse_relay(index, on_ms, self.pulse_encoding)?;
        debug!(%index, on_ms, encoding = %self.pulse_encoding, "pulse relay");
        self.exchange(&frame).await
    }

    /// Read the firmware version register.
    ///
    /// Returns the raw reply; [`commands::parse_sw_version`] decodes it.
    pub async fn read_sw_version(&mut self) -> Result<Vec<u8>> {
        let frame = commands::cmd_read_sw_version();
        debug!("read firmware version");
        self.exchange(&frame).await
    }

    /// Broadcast the discovery probe and return the first board to answer.
    pub async fn discover(&mut self) -> Result<DiscoveryReply> {
        discovery::discover(&self.discovery).await
    }

    /// The address the next command will connect to.
    ///
    /// A configured address is returned as-is. Otherwise the board is
    /// discovered and its IP is paired with the configured command port.
    pub async fn resolve_address(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.address {
            return Ok(addr);
        }
        let reply = self.discover().await?;
        let addr = SocketAddr::new(reply.addr.ip(), self.port);
        debug!(%addr, "using discovered board address");
        Ok(addr)
    }

    /// Run one [`RelayCommand`].
    pub async fn execute(&mut self, command: RelayCommand) -> Result<CommandReply> {
        let reply = match command {
            RelayCommand::Toggle { index, action } => {
                CommandReply::Frame(self.toggle_relay(index, action).await?)
            }
            RelayCommand::ToggleAll { action } => {
                CommandReply::Frame(self.toggle_all_relays(action).await?)
            }
            RelayCommand::Pulse { index, on_ms } => {
                CommandReply::Frame(self.pulse_relay(index, on_ms).await?)
            }
            RelayCommand::SwVersion => CommandReply::Frame(self.read_sw_version().await?),
            RelayCommand::Discover => CommandReply::Discovered(self.discover().await?),
        };
        Ok(reply)
    }

    /// Resolve, connect, exchange one frame, close.
    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let addr = self.resolve_address().await?;
        let transport = self
            .connector
            .connect(addr, self.connect_timeout)
            .await
            .map_err(|e| match e {
                Error::Timeout => Error::Transport(format!("connect to {} timed out", addr)),
                other => other,
            })?;
        exchange::transact(transport, frame, self.command_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaylib_test_harness::{MockConnector, MockDiscoveryResponder, MockTransport};

    const BOARD: &str = "192.168.1.200:4196";
    const VERSION_REPLY: [u8; 7] = [0x01, 0x03, 0x02, 0x00, 0xC8, 0xB9, 0xD2];

    fn board_at(connector: &MockConnector, addr: Option<SocketAddr>) -> RelayBoard {
        RelayBoard::new(
            Box::new(connector.clone()),
            addr,
            4196,
            Duration::from_millis(300),
            Duration::from_secs(1),
            PulseEncoding::default(),
            DiscoveryConfig::default(),
        )
    }

    /// A transport that echoes `request` back, as the board does for writes.
    fn echo(request: &[u8]) -> (MockTransport, relaylib_test_harness::TransportProbe) {
        let mut mock = MockTransport::new();
        mock.expect(request, request);
        let probe = mock.probe();
        (mock, probe)
    }

    #[tokio::test]
    async fn toggle_relay_echo() {
        let request = [0x01, 0x05, 0x00, 0x02, 0x55, 0x00, 0x53, 0x5A];
        let connector = MockConnector::new();
        let (mock, probe) = echo(&request);
        connector.push(mock);

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        let reply = board
            .toggle_relay(RelayIndex::new(2), RelayAction::Flip)
            .await
            .unwrap();

        assert_eq!(reply, request);
        assert_eq!(probe.sent_data(), vec![request.to_vec()]);
        assert_eq!(probe.close_count(), 1);
        assert_eq!(connector.connections(), vec![BOARD.parse().unwrap()]);
    }

    #[tokio::test]
    async fn each_command_opens_its_own_connection() {
        let on = [0x01, 0x05, 0x00, 0xFF, 0xFF, 0x00, 0xBC, 0x0A];
        let off = [0x01, 0x05, 0x00, 0xFF, 0x00, 0x00, 0xFD, 0xFA];
        let connector = MockConnector::new();
        let (first, first_probe) = echo(&on);
        let (second, second_probe) = echo(&off);
        connector.push(first);
        connector.push(second);

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        board.toggle_all_relays(RelayAction::On).await.unwrap();
        board.toggle_all_relays(RelayAction::Off).await.unwrap();

        assert_eq!(connector.connections().len(), 2);
        assert_eq!(first_probe.sent_data(), vec![on.to_vec()]);
        assert_eq!(second_probe.sent_data(), vec![off.to_vec()]);
        assert_eq!(first_probe.close_count(), 1);
        assert_eq!(second_probe.close_count(), 1);
    }

    #[tokio::test]
    async fn pulse_uses_configured_encoding() {
        // 1500 ms = 15 ticks; legacy encoding sends 0x0015.
        let legacy = [0x01, 0x05, 0x02, 0x03, 0x00, 0x15, 0xFD, 0xBD];
        // Binary encoding sends 0x000F.
        let binary = [0x01, 0x05, 0x02, 0x03, 0x00, 0x0F, 0x7C, 0x76];

        let connector = MockConnector::new();
        let (mock, probe) = echo(&legacy);
        connector.push(mock);
        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        board.pulse_relay(RelayIndex::new(3), 1500).await.unwrap();
        assert_eq!(probe.sent_data(), vec![legacy.to_vec()]);

        let connector = MockConnector::new();
        let (mock, probe) = echo(&binary);
        connector.push(mock);
        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        board.pulse_encoding = PulseEncoding::Binary;
        board.pulse_relay(RelayIndex::new(3), 1500).await.unwrap();
        assert_eq!(probe.sent_data(), vec![binary.to_vec()]);
    }

    #[tokio::test]
    async fn invalid_pulse_opens_no_connection() {
        let connector = MockConnector::new();
        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));

        let err = board.pulse_relay(RelayIndex::new(1), 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
        assert!(connector.connections().is_empty());
    }

    #[tokio::test]
    async fn read_sw_version_returns_raw_reply() {
        let request = commands::cmd_read_sw_version();
        let connector = MockConnector::new();
        let mut mock = MockTransport::new();
        mock.expect(&request, &VERSION_REPLY);
        connector.push(mock);

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        let reply = board.read_sw_version().await.unwrap();
        assert_eq!(reply, VERSION_REPLY);
        assert_eq!(
            commands::parse_sw_version(&reply).unwrap().to_string(),
            "V2.00"
        );
    }

    #[tokio::test]
    async fn timeout_still_closes_connection() {
        let request = commands::cmd_read_sw_version();
        let connector = MockConnector::new();
        let mut mock = MockTransport::new();
        mock.expect(&request, &VERSION_REPLY[..4]);
        let probe = mock.probe();
        connector.push(mock);

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        let err = board.read_sw_version().await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let connector = MockConnector::new();
        connector.push_refusal();

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        let err = board
            .toggle_relay(RelayIndex::new(0), RelayAction::On)
            .await
            .unwrap_err();
        assert!(err.is_connection_error(), "got: {:?}", err);
    }

    #[tokio::test]
    async fn execute_dispatches_commands() {
        let request = [0x01, 0x05, 0x00, 0x00, 0xFF, 0x00, 0x8C, 0x3A];
        let connector = MockConnector::new();
        let (mock, _) = echo(&request);
        connector.push(mock);

        let mut board = board_at(&connector, Some(BOARD.parse().unwrap()));
        let command: RelayCommand = "toggle 0 on".parse().unwrap();
        let reply = board.execute(command).await.unwrap();
        assert_eq!(reply, CommandReply::Frame(request.to_vec()));
    }

    #[tokio::test]
    async fn discovered_ip_is_paired_with_command_port() {
        let mut responder = MockDiscoveryResponder::new().await.unwrap();
        responder.reply_with(b"RELAY_0001");

        let request = [0x01, 0x05, 0x00, 0x01, 0x00, 0x00, 0x9C, 0x0A];
        let connector = MockConnector::new();
        let (mock, probe) = echo(&request);
        connector.push(mock);

        let mut board = board_at(&connector, None);
        board.discovery.target = responder.addr();
        board.discovery.timeout = Duration::from_secs(2);

        board
            .toggle_relay(RelayIndex::new(1), RelayAction::Off)
            .await
            .unwrap();

        let expected = SocketAddr::new(responder.addr().ip(), 4196);
        assert_eq!(connector.connections(), vec![expected]);
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn discovery_failure_opens_no_connection() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connector = MockConnector::new();

        let mut board = board_at(&connector, None);
        board.discovery.target = silent.local_addr().unwrap();
        board.discovery.timeout = Duration::from_millis(100);

        let err = board
            .toggle_relay(RelayIndex::new(1), RelayAction::On)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
        assert!(connector.connections().is_empty());
    }
}
