//! Error types for relaylib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Nothing here is fatal to the process:
//! every failure is handed back to the caller, and retry policy belongs to
//! whoever issued the command.

/// The error type for all relaylib operations.
///
/// The variants fall into four groups:
///
/// - timeouts ([`Error::Timeout`]): no checksum-valid frame arrived before
///   the deadline
/// - connection failures ([`Error::Transport`], [`Error::NotConnected`],
///   [`Error::ConnectionLost`], [`Error::Io`]): recoverable by opening a new
///   connection, see [`Error::is_connection_error`]
/// - discovery misses ([`Error::NotFound`])
/// - caller mistakes ([`Error::InvalidParameter`]), which should not be retried
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (TCP connect refused, UDP bind failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed or unexpected reply from the board).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a checksum-valid response from the board.
    #[error("timeout waiting for response")]
    Timeout,

    /// Discovery finished without any board answering the probe.
    #[error("no relay board answered the discovery probe")]
    NotFound,

    /// An invalid parameter was passed to a command encoder or builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the board has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the board was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for failures at the connection layer: connect, write,
    /// or read errors that a fresh connection may cure.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::NotConnected | Error::ConnectionLost | Error::Io(_)
        )
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
