//! Request/response exchange with the board.
//!
//! The board's replies carry no length field. The reader therefore pulls
//! the reply in one byte at a time and re-runs the CRC over everything
//! received so far; the first time it comes out zero, the reply is
//! complete. A peer that never produces a zero checksum is cut off by the
//! wall-clock deadline, which is the only bound on the buffer.
//!
//! ```text
//! IDLE --send--> SENT --> READING --crc == 0--> COMPLETE
//!                           |  ^
//!                           +--+ byte appended, crc != 0
//!                           |
//!                           +--deadline--> TIMEOUT
//!                           +--I/O error--> CONN_ERROR
//! ```

use std::time::Duration;

use relaylib_core::error::{Error, Result};
use relaylib_core::transport::Transport;
use tokio::time::Instant;

use crate::crc;

/// Send `frame` and read until a checksum-valid reply arrives or `timeout`
/// elapses.
///
/// The deadline is fixed before the frame is written, so the call never
/// returns [`Error::Timeout`] earlier than `timeout` after it started, and
/// never much later: each read waits at most for the time remaining.
///
/// The transport is left open; see [`transact`] for the variant that owns
/// and closes it.
pub async fn send_and_await(
    transport: &mut dyn Transport,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;

    transport.send(frame).await?;
    tracing::trace!(
        bytes = frame.len(),
        timeout_ms = timeout.as_millis(),
        "Frame sent, reading reply"
    );

    let mut response = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(
                received = response.len(),
                partial = ?response,
                "No checksum-valid reply before deadline"
            );
            return Err(Error::Timeout);
        }

        let mut byte = [0u8; 1];
        if transport.receive(&mut byte, remaining).await? == 0 {
            continue;
        }
        response.push(byte[0]);

        if crc::is_complete_frame(&response) {
            tracing::trace!(bytes = response.len(), data = ?response, "Reply complete");
            return Ok(response);
        }
    }
}

/// Run one exchange over `transport` and close it, whatever the outcome.
///
/// A failure to close is logged and does not mask the exchange result.
pub async fn transact(
    mut transport: Box<dyn Transport>,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>> {
    let result = send_and_await(transport.as_mut(), frame, timeout).await;

    if let Err(e) = transport.close().await {
        tracing::warn!(error = %e, "Failed to close transport after exchange");
    }

    match &result {
        Ok(reply) => tracing::debug!(bytes = reply.len(), "Exchange complete"),
        Err(e) => tracing::debug!(error = %e, "Exchange failed"),
    }
    result
}
