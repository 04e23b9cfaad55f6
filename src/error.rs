//! Error types for the chat relay
//!
//! Per-session errors never leave the session's own task; server errors
//! are the only ones surfaced to the operator.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors raised by a single session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Peer closed the stream before sending a username
    #[error("connection closed before a username was received")]
    HandshakeClosed,

    /// Reading the username line failed
    #[error("handshake failed: {0}")]
    Handshake(#[source] LinesCodecError),

    /// No username arrived within the configured timeout
    #[error("no username received within the handshake timeout")]
    HandshakeTimeout,

    /// Peer closed the stream
    #[error("peer closed the connection")]
    PeerClosed,

    /// Reading a line failed (I/O, invalid UTF-8 or an over-long line)
    #[error("read failed: {0}")]
    Read(#[source] LinesCodecError),

    /// Writing a line to the socket failed
    #[error("write failed: {0}")]
    Write(#[source] LinesCodecError),

    /// Outbound queue is full; the recipient is not keeping up
    #[error("outbound queue is full")]
    SlowConsumer,

    /// Writer task has stopped after an earlier write failure
    #[error("outbound writer has stopped")]
    WriterGone,

    /// Operation on a session that is already closed
    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Whether this error belongs to the handshake phase
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            SessionError::HandshakeClosed
                | SessionError::Handshake(_)
                | SessionError::HandshakeTimeout
        )
    }

    /// Whether this error is a failed delivery to the session
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            SessionError::Write(_) | SessionError::SlowConsumer | SessionError::WriterGone
        )
    }
}

/// Server-level errors (fatal)
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The listening socket keeps failing
    #[error("listener failed: {0}")]
    ListenerFatal(#[source] std::io::Error),
}
