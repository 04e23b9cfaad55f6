//! Fan-out of lines to registered sessions
//!
//! A broadcast works on a registry snapshot, so a session that joins or
//! leaves while it runs is either fully included or fully excluded.
//! Sends only enqueue; a failed recipient is torn down in its own task.

use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::SessionError;
use crate::lifecycle;
use crate::message::Announcement;
use crate::registry::Registry;
use crate::session::Session;
use crate::types::SessionId;

/// Delivers lines to every registered session but the originator
#[derive(Debug, Clone, Default)]
pub struct Broadcaster {
    registry: Registry,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Get the registry this broadcaster delivers to
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Queue `text` for every member other than `originator`
    ///
    /// Returns the number of recipients the line was queued for. Failures
    /// never propagate: a recipient that cannot take the line is scheduled
    /// for teardown and the round continues.
    pub fn broadcast(&self, originator: Option<SessionId>, text: &str) -> usize {
        let mut delivered = 0;

        for member in self.registry.snapshot() {
            if Some(member.id()) == originator {
                continue;
            }

            match member.send(text) {
                Ok(()) => delivered += 1,
                Err(SessionError::Closed) => {
                    trace!("Skipping session {}, left during broadcast", member.id());
                }
                Err(e) => {
                    warn!(
                        "Delivery to session {} ('{}') failed: {}",
                        member.id(),
                        member.username(),
                        e
                    );
                    self.spawn_teardown(member);
                }
            }
        }

        delivered
    }

    /// Relay a chat line from `originator` to everyone else
    ///
    /// Returns `None` without delivering anything once the originator is
    /// no longer active. The check and the fan-out run under the
    /// originator's relay lock, which teardown also holds while it
    /// announces the departure.
    pub fn relay(&self, originator: &Session, text: &str) -> Option<usize> {
        let _relay = originator.relay_lock();
        if !originator.is_active() {
            return None;
        }
        Some(self.broadcast(Some(originator.id()), text))
    }

    /// Broadcast a server control line on behalf of `originator`
    pub fn announce(&self, originator: &Session, announcement: Announcement<'_>) -> usize {
        self.broadcast(Some(originator.id()), &announcement.to_string())
    }

    fn spawn_teardown(&self, session: Arc<Session>) {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            lifecycle::teardown(&broadcaster, &session);
        });
    }
}
