//! Mock relay board over real loopback sockets.
//!
//! [`MockTcpServer`] plays the board's TCP side: it accepts one connection
//! per scripted exchange, checks the request frame, sends the scripted
//! reply, and then waits for the client to close the connection.
//! [`MockDiscoveryResponder`] plays the board's UDP side, answering a
//! discovery probe with a scripted datagram.
//!
//! # Example
//!
//! ```
//! use relaylib_test_harness::{MockTcpServer, TcpReply};
//!
//! # async fn example() -> relaylib_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//! server.expect(
//!     &[0x01, 0x05, 0x00, 0xFF, 0x55, 0x00, 0xC2, 0xAA],
//!     TcpReply::Bytes(vec![0x01, 0x05, 0x00, 0xFF, 0x55, 0x00, 0xC2, 0xAA]),
//! );
//! let addr = server.addr();
//! server.start();
//! // ... connect to `addr` and run a command ...
//! # Ok(())
//! # }
//! ```

use relaylib_core::error::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

/// How long the server waits for the client to close its side after an
/// exchange before declaring the connection leaked.
const CLOSE_WAIT: Duration = Duration::from_secs(5);

/// What the mock board does after reading a request.
#[derive(Debug, Clone)]
pub enum TcpReply {
    /// Write these bytes back, in one write.
    Bytes(Vec<u8>),
    /// Write these bytes one at a time with `gap` between them.
    Trickle { bytes: Vec<u8>, gap: Duration },
    /// Send nothing and keep the connection open.
    Silence,
    /// Close the connection immediately.
    HangUp,
}

#[derive(Debug, Clone)]
struct TcpExpectation {
    request: Vec<u8>,
    reply: TcpReply,
}

/// A mock relay board listening on a random localhost port.
///
/// Each expectation is served on its own accepted connection, in order,
/// mirroring the one-connection-per-command lifecycle. After each reply the
/// server requires the client to close the connection; a client that keeps
/// it open makes [`wait`](MockTcpServer::wait) fail.
pub struct MockTcpServer {
    addr: SocketAddr,
    listener: Option<TcpListener>,
    expectations: Vec<TcpExpectation>,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Bind a new mock server on `127.0.0.1` with an OS-assigned port.
    ///
    /// No connection is accepted until [`start`](MockTcpServer::start)
    /// is called, so expectations can be loaded first.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {}", e)))?;
        let addr = listener.local_addr().map_err(Error::Io)?;

        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: Vec::new(),
            server_handle: None,
        })
    }

    /// Add an expected request and the reply to give on its connection.
    pub fn expect(&mut self, request: &[u8], reply: TcpReply) {
        self.expectations.push(TcpExpectation {
            request: request.to_vec(),
            reply,
        });
    }

    /// The address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start serving all expectations on a background task.
    ///
    /// Calling `start` twice has no further effect.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations = std::mem::take(&mut self.expectations);

        let handle = tokio::spawn(async move {
            for (i, expectation) in expectations.iter().enumerate() {
                let (mut stream, peer) = listener
                    .accept()
                    .await
                    .map_err(|e| format!("exchange {}: failed to accept connection: {}", i, e))?;
                tracing::debug!(exchange = i, peer = %peer, "Mock board accepted connection");
                serve_exchange(i, &mut stream, expectation).await?;
            }
            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task to finish and return any errors.
    ///
    /// Call this after the client has finished its commands to verify that
    /// every expectation was met and every connection was closed.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {}", e))?,
            None => Ok(()),
        }
    }
}

async fn serve_exchange(
    i: usize,
    stream: &mut TcpStream,
    expectation: &TcpExpectation,
) -> std::result::Result<(), String> {
    let mut buf = vec![0u8; expectation.request.len()];
    stream.read_exact(&mut buf).await.map_err(|e| {
        format!(
            "exchange {}: failed to read {} request bytes: {}",
            i,
            expectation.request.len(),
            e
        )
    })?;

    if buf != expectation.request {
        return Err(format!(
            "exchange {}: request mismatch: expected {:02X?}, got {:02X?}",
            i, expectation.request, buf
        ));
    }

    match &expectation.reply {
        TcpReply::Bytes(bytes) => {
            stream
                .write_all(bytes)
                .await
                .map_err(|e| format!("exchange {}: write error: {}", i, e))?;
        }
        TcpReply::Trickle { bytes, gap } => {
            for byte in bytes {
                stream
                    .write_all(std::slice::from_ref(byte))
                    .await
                    .map_err(|e| format!("exchange {}: write error: {}", i, e))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| format!("exchange {}: flush error: {}", i, e))?;
                tokio::time::sleep(*gap).await;
            }
        }
        TcpReply::Silence => {}
        TcpReply::HangUp => return Ok(()),
    }
    stream
        .flush()
        .await
        .map_err(|e| format!("exchange {}: flush error: {}", i, e))?;

    // The client must close its end once it has what it needs.
    let mut sink = [0u8; 64];
    loop {
        match tokio::time::timeout(CLOSE_WAIT, stream.read(&mut sink)).await {
            Ok(Ok(0)) => return Ok(()),
            Ok(Ok(n)) => {
                return Err(format!(
                    "exchange {}: unexpected {} extra bytes from client",
                    i, n
                ));
            }
            // A reset also means the client let go of the connection.
            Ok(Err(_)) => return Ok(()),
            Err(_) => {
                return Err(format!(
                    "exchange {}: client did not close the connection",
                    i
                ));
            }
        }
    }
}

/// A mock board answering UDP discovery probes on `127.0.0.1`.
pub struct MockDiscoveryResponder {
    addr: SocketAddr,
    socket: Option<UdpSocket>,
    handle: Option<JoinHandle<std::result::Result<Vec<u8>, String>>>,
}

impl MockDiscoveryResponder {
    /// Bind a responder with an OS-assigned port.
    pub async fn new() -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock responder: {}", e)))?;
        let addr = socket.local_addr().map_err(Error::Io)?;
        Ok(Self {
            addr,
            socket: Some(socket),
            handle: None,
        })
    }

    /// The address to send the probe to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answer the first datagram received with `reply`.
    pub fn reply_with(&mut self, reply: &[u8]) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        let reply = reply.to_vec();
        self.handle = Some(tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (n, src) = socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| format!("failed to receive probe: {}", e))?;
            socket
                .send_to(&reply, src)
                .await
                .map_err(|e| format!("failed to send reply: {}", e))?;
            Ok(buf[..n].to_vec())
        }));
    }

    /// Wait for the responder and return the probe it received.
    pub async fn wait(self) -> std::result::Result<Vec<u8>, String> {
        match self.handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("responder task panicked: {}", e))?,
            None => Err("responder was never started".into()),
        }
    }
}
