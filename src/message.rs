//! Wire protocol definitions
//!
//! The protocol is newline-delimited UTF-8 text. The first line from a
//! client is its username, every later line is relayed verbatim. The only
//! server-originated lines are join/leave announcements.

use std::fmt;

/// Prefix of every server-originated line
pub const SERVER_PREFIX: &str = "SERVER: ";

/// Server → Client control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement<'a> {
    /// A user was registered
    Joined(&'a str),
    /// A user was deregistered
    Left(&'a str),
}

impl fmt::Display for Announcement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Announcement::Joined(username) => {
                write!(f, "{}{} has entered the chat!", SERVER_PREFIX, username)
            }
            Announcement::Left(username) => {
                write!(f, "{}{} has left the chat!", SERVER_PREFIX, username)
            }
        }
    }
}
