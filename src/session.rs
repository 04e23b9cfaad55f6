//! Session struct definition
//!
//! A session owns one client connection. The stream is split on open:
//! the inbound half becomes a [`SessionReader`] owned by the read loop,
//! the outbound half is owned by a writer task fed through a bounded
//! queue, so concurrent senders never interleave partial lines.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::types::{SessionId, SessionState};

/// Server-side state of one connected client
#[derive(Debug)]
pub struct Session {
    /// Connection-scoped identity
    id: SessionId,
    /// First line the client sent, taken verbatim
    username: String,
    /// Remote address, for logs
    peer: String,
    /// Encoded `SessionState`
    state: AtomicU8,
    /// Session → writer task queue; `None` once released
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    /// Stops the reader and the writer task
    cancel: CancellationToken,
    /// Orders lines relayed from this session against its announcements
    relay: Mutex<()>,
}

impl Session {
    /// Take ownership of a connected stream and read the username line
    ///
    /// The returned session is still `Connecting`; it becomes `Active`
    /// when the registry admits it. Handshake failures drop the stream.
    pub async fn open<S>(
        stream: S,
        peer: impl Into<String>,
        config: &SessionConfig,
    ) -> Result<(Arc<Session>, SessionReader<ReadHalf<S>>), SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut lines = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(config.max_line_length),
        );

        let username = match config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, read_username(&mut lines))
                .await
                .map_err(|_| SessionError::HandshakeTimeout)??,
            None => read_username(&mut lines).await?,
        };

        let (sender, receiver) = mpsc::channel(config.outbound_capacity);
        let cancel = CancellationToken::new();
        let session = Arc::new(Session {
            id: SessionId::new(),
            username,
            peer: peer.into(),
            state: AtomicU8::new(SessionState::Connecting as u8),
            outbound: Mutex::new(Some(sender)),
            cancel: cancel.clone(),
            relay: Mutex::new(()),
        });

        let sink = FramedWrite::new(write_half, LinesCodec::new());
        tokio::spawn(write_loop(session.id, sink, receiver, cancel.clone()));

        debug!(
            "Session {} opened for '{}' from {}",
            session.id, session.username, session.peer
        );

        Ok((session, SessionReader { lines, cancel }))
    }

    /// Get the connection-scoped identity
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get the username announced during the handshake
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the remote address label
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Get the current lifecycle state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if the session is registered and eligible for broadcasts
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Check if the session has been deregistered or released
    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Held while relaying a line from this session and while announcing
    /// its join or departure, so none of its lines follow its "has left"
    pub(crate) fn relay_lock(&self) -> MutexGuard<'_, ()> {
        self.relay.lock()
    }

    /// Queue one line for delivery to this client
    ///
    /// Never blocks. A full queue means the client is not keeping up and
    /// is reported as a write failure, like a dead writer.
    pub fn send(&self, text: &str) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let outbound = self.outbound.lock();
        let Some(sender) = outbound.as_ref() else {
            return Err(SessionError::Closed);
        };

        sender.try_send(text.to_owned()).map_err(|e| match e {
            TrySendError::Full(_) => SessionError::SlowConsumer,
            TrySendError::Closed(_) => SessionError::WriterGone,
        })
    }

    /// Release the stream and the outbound queue
    ///
    /// Idempotent. Returns true only for the call that performed the release.
    pub fn close(&self) -> bool {
        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
        let released = self.outbound.lock().take().is_some();
        self.cancel.cancel();

        if released {
            debug!("Session {} ('{}') closed", self.id, self.username);
        }
        released
    }

    /// `Connecting -> Active`; only the registry calls this, under its lock
    pub(crate) fn activate(&self) -> bool {
        self.transition(SessionState::Connecting, SessionState::Active)
    }

    /// `Active -> Closed`; only the registry calls this, under its lock
    pub(crate) fn deactivate(&self) -> bool {
        self.transition(SessionState::Active, SessionState::Closed)
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Inbound line source of a session
///
/// Owned by the session's read loop. Once it has returned an error it
/// should not be polled again.
#[derive(Debug)]
pub struct SessionReader<R> {
    lines: FramedRead<R, LinesCodec>,
    cancel: CancellationToken,
}

impl<R> SessionReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wait for the next line from the client
    pub async fn read_line(&mut self) -> Result<String, SessionError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SessionError::Closed),
            next = self.lines.next() => match next {
                Some(Ok(line)) => Ok(line),
                Some(Err(e)) => Err(SessionError::Read(e)),
                None => Err(SessionError::PeerClosed),
            },
        }
    }
}

async fn read_username<R>(lines: &mut FramedRead<R, LinesCodec>) -> Result<String, SessionError>
where
    R: AsyncRead + Unpin,
{
    match lines.next().await {
        Some(Ok(username)) => Ok(username),
        Some(Err(e)) => Err(SessionError::Handshake(e)),
        None => Err(SessionError::HandshakeClosed),
    }
}

/// Drain the outbound queue into the socket
///
/// A failed write cancels the session so its read loop tears it down.
async fn write_loop<W>(
    id: SessionId,
    mut sink: FramedWrite<W, LinesCodec>,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(line) => line,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = sink.send(line) => {
                if let Err(e) = result {
                    warn!("Write to session {} failed: {}", id, SessionError::Write(e));
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    debug!("Writer task ended for session {}", id);
}
