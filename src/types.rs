//! Basic type definitions for the chat relay
//!
//! Provides the `SessionId` newtype and the session lifecycle states.

use uuid::Uuid;

/// Unique session identifier (newtype pattern)
///
/// Wraps a UUID v4. Identity is per connection, not per username:
/// two clients announcing the same name are still distinct sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session
///
/// `Connecting -> Active -> Closed`, or `Connecting -> Closed` when the
/// session is discarded before it was ever registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Username read (or pending), not yet registered
    Connecting = 0,
    /// Registered and eligible for broadcasts
    Active = 1,
    /// Deregistered or released; terminal
    Closed = 2,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}
