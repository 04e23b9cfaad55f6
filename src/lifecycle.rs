//! Per-connection lifecycle
//!
//! Handles individual client connections: username handshake,
//! registration and join announcement, the read loop, and teardown.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::message::Announcement;
use crate::session::{Session, SessionReader};

/// Drive one connection from handshake to teardown
///
/// Only handshake failures are returned; once registered, every error
/// ends in teardown and the function returns `Ok`.
pub async fn handle_connection<S>(
    stream: S,
    peer: String,
    broadcaster: Broadcaster,
    config: SessionConfig,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (session, reader) = Session::open(stream, peer, &config).await?;

    if !admit(&broadcaster, &session) {
        session.close();
        return Ok(());
    }

    read_loop(&broadcaster, &session, reader).await;
    Ok(())
}

/// Register the session, then tell everyone else it joined
///
/// The announcement goes out only after the registry insert, so nobody
/// sees a message from a user they were not told about.
pub fn admit(broadcaster: &Broadcaster, session: &Arc<Session>) -> bool {
    let _relay = session.relay_lock();
    if !broadcaster.registry().add(Arc::clone(session)) {
        debug!("Session {} was not admitted", session.id());
        return false;
    }

    info!(
        "'{}' joined from {} (session {})",
        session.username(),
        session.peer(),
        session.id()
    );
    broadcaster.announce(session, Announcement::Joined(session.username()));
    true
}

/// Relay every inbound line until the session fails, then tear it down
pub async fn read_loop<R>(
    broadcaster: &Broadcaster,
    session: &Arc<Session>,
    mut reader: SessionReader<R>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match reader.read_line().await {
            Ok(line) => {
                if broadcaster.relay(session, &line).is_none() {
                    debug!("Session {} left while relaying, dropping line", session.id());
                    break;
                }
            }
            Err(e) => {
                debug!("Read loop for session {} ended: {}", session.id(), e);
                break;
            }
        }
    }

    drop(reader);
    teardown(broadcaster, session);
}

/// Deregister, announce departure, release the stream
///
/// Safe to call from several failure paths at once. Returns true only
/// for the call that deregistered the session; only that call announces.
pub fn teardown(broadcaster: &Broadcaster, session: &Arc<Session>) -> bool {
    let removed = {
        let _relay = session.relay_lock();
        let removed = broadcaster.registry().remove(session);
        if removed {
            info!(
                "'{}' left (session {})",
                session.username(),
                session.id()
            );
            broadcaster.announce(session, Announcement::Left(session.username()));
        }
        removed
    };

    session.close();
    removed
}
