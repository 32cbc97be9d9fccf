//! Mock transport and connector for deterministic testing of the exchange
//! loop and the command facade.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. [`MockConnector`] hands those transports out one
//! per `connect()` call, the way a real connector opens one TCP connection
//! per command.
//!
//! Because a transport is moved into the code under test, everything a test
//! wants to inspect afterwards (frames sent, how often `close()` ran) is
//! recorded in a shared [`TransportProbe`].
//!
//! # Example
//!
//! ```
//! use relaylib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // Firmware-version request and the board's reply.
//! mock.expect(&[0x01, 0x03, 0x80, 0x00, 0x00, 0x01, 0xAD, 0xCA],
//!             &[0x01, 0x03, 0x02, 0x00, 0xC8, 0xB9, 0xD2]);
//! let probe = mock.probe();
//! assert_eq!(probe.close_count(), 0);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use relaylib_core::error::{Error, Result};
use relaylib_core::transport::{Connector, Transport};

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes handed out by subsequent `receive()` calls.
    response: Vec<u8>,
    /// Once `response` is drained, report the peer as gone instead of
    /// staying silent.
    hang_up: bool,
}

#[derive(Debug, Default)]
struct ProbeState {
    sent: Vec<Vec<u8>>,
    closes: usize,
}

/// Shared record of what happened to a [`MockTransport`].
///
/// Cloning a probe yields another view of the same record.
#[derive(Debug, Clone, Default)]
pub struct TransportProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl TransportProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every byte slice passed to `send()`, in order.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// How many times `close()` has been called.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Returns `true` once `close()` has been called at least once.
    pub fn was_closed(&self) -> bool {
        self.close_count() > 0
    }
}

/// A mock [`Transport`] for testing protocol code without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; the
/// corresponding response is then handed out by `receive()`, at most
/// `buf.len()` bytes per call.
///
/// With nothing pending, `receive()` behaves like a silent peer: it waits
/// out the full timeout and returns [`Error::Timeout`].
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    /// Bytes not yet handed out by `receive()`.
    pending: VecDeque<u8>,
    /// Whether the current exchange ends with the peer hanging up.
    hang_up: bool,
    connected: bool,
    probe: TransportProbe,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending: VecDeque::new(),
            hang_up: false,
            connected: true,
            probe: TransportProbe::default(),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
            hang_up: false,
        });
    }

    /// Expect `request`, answer with `partial`, then drop the connection.
    ///
    /// Once `partial` is drained, `receive()` returns
    /// [`Error::ConnectionLost`].
    pub fn expect_then_hang_up(&mut self, request: &[u8], partial: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: partial.to_vec(),
            hang_up: true,
        });
    }

    /// A shared view of what this transport records.
    pub fn probe(&self) -> TransportProbe {
        self.probe.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls return
    /// [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.probe.lock().sent.push(data.to_vec());

        let expectation = self.expectations.pop_front().ok_or_else(|| {
            Error::Protocol("no more expectations in mock transport".into())
        })?;
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected send data: expected {:02X?}, got {:02X?}",
                expectation.request, data
            )));
        }
        self.pending = expectation.response.into();
        self.hang_up = expectation.hang_up;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if self.pending.is_empty() {
            if self.hang_up {
                self.hang_up = false;
                return Err(Error::ConnectionLost);
            }
            tokio::time::sleep(timeout).await;
            return Err(Error::Timeout);
        }

        let n = self.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending.clear();
        self.hang_up = false;
        self.probe.lock().closes += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

enum Slot {
    Transport(MockTransport),
    Refuse,
}

#[derive(Default)]
struct ConnectorState {
    slots: VecDeque<Slot>,
    connections: Vec<SocketAddr>,
}

/// A mock [`Connector`] that hands out queued [`MockTransport`]s.
///
/// Clones share the same queue, so a test can keep one clone for
/// inspection after moving another into the code under test.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a transport for the next `connect()` call.
    pub fn push(&self, transport: MockTransport) {
        self.lock().slots.push_back(Slot::Transport(transport));
    }

    /// Make the next `connect()` call fail as if the board refused it.
    pub fn push_refusal(&self) {
        self.lock().slots.push_back(Slot::Refuse);
    }

    /// Addresses passed to `connect()`, in order.
    pub fn connections(&self) -> Vec<SocketAddr> {
        self.lock().connections.clone()
    }

    /// Number of queued slots not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().slots.len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> Result<Box<dyn Transport>> {
        let mut state = self.lock();
        state.connections.push(addr);
        match state.slots.pop_front() {
            Some(Slot::Transport(transport)) => Ok(Box::new(transport)),
            Some(Slot::Refuse) => Err(Error::Transport(format!("connection refused: {}", addr))),
            None => Err(Error::Transport(
                "mock connector has no transports left".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn basic_send_receive() {
        let mut mock = MockTransport::new();
        let request = &[0x01, 0x03, 0x80, 0x00, 0x00, 0x01, 0xAD, 0xCA];
        let response = &[0x01, 0x03, 0x02, 0x00, 0xC8, 0xB9, 0xD2];
        mock.expect(request, response);

        mock.send(request).await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], response);
    }

    #[tokio::test]
    async fn byte_at_a_time_receive() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xAA, 0xBB, 0xCC]);
        mock.send(&[0x01]).await.unwrap();

        let mut got = Vec::new();
        for _ in 0..3 {
            let mut byte = [0u8; 1];
            let n = mock
                .receive(&mut byte, Duration::from_millis(100))
                .await
                .unwrap();
            assert_eq!(n, 1);
            got.push(byte[0]);
        }
        assert_eq!(got, vec![0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn probe_tracks_sent_data_and_closes() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01, 0x02], &[0xFF]);
        let probe = mock.probe();

        mock.send(&[0x01, 0x02]).await.unwrap();
        assert_eq!(probe.sent_data(), vec![vec![0x01, 0x02]]);
        assert!(!probe.was_closed());

        mock.close().await.unwrap();
        mock.close().await.unwrap();
        assert_eq!(probe.close_count(), 2);
        assert!(!mock.is_connected());
    }

    #[tokio::test]
    async fn wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect(&[0x01], &[0xFF]);

        let result = mock.send(&[0x99]).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn no_expectations_errors() {
        let mut mock = MockTransport::new();
        assert!(matches!(mock.send(&[0x01]).await, Err(Error::Protocol(_))));
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test]
    async fn silent_peer_waits_out_the_timeout() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 1];

        let started = Instant::now();
        let result = mock.receive(&mut buf, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn hang_up_after_partial_reply() {
        let mut mock = MockTransport::new();
        mock.expect_then_hang_up(&[0x01], &[0x01, 0x05]);
        mock.send(&[0x01]).await.unwrap();

        let mut buf = [0u8; 8];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[0x01, 0x05]);

        let result = mock.receive(&mut buf, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(Error::ConnectionLost)));
    }

    #[tokio::test]
    async fn set_connected_false_rejects_io() {
        let mut mock = MockTransport::new();
        mock.set_connected(false);
        assert!(!mock.is_connected());

        assert!(matches!(mock.send(&[0x01]).await, Err(Error::NotConnected)));
        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn connector_hands_out_queued_transports() {
        let connector = MockConnector::new();
        connector.push(MockTransport::new());
        connector.push_refusal();
        let addr: SocketAddr = "10.0.0.7:4196".parse().unwrap();

        let transport = connector
            .connect(addr, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(transport.is_connected());

        let err = connector
            .connect(addr, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Transport(_)));

        let err = connector
            .connect(addr, Duration::from_secs(1))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Transport(_)));

        assert_eq!(connector.connections(), vec![addr, addr, addr]);
        assert_eq!(connector.remaining(), 0);
    }
}
