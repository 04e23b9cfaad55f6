//! Line-oriented TCP Chat Relay Library
//!
//! Clients connect over TCP, send a username as their first line, and
//! every later line they send is relayed verbatim to all other clients.
//!
//! # Features
//! - Username handshake (first line)
//! - Join/leave announcements (`SERVER: ...`)
//! - Relay to everyone but the sender
//! - Per-sender ordering
//! - Slow or failing clients are isolated and torn down
//!
//! # Architecture
//! - `Registry` is the shared set of active sessions (one lock, snapshots for iteration)
//! - `Broadcaster` fans a line out over a registry snapshot
//! - Each `Session` has a bounded outbound queue drained by its own writer task
//! - Each connection runs its read loop in its own task (`lifecycle`)
//! - `ChatServer` accepts connections and spawns the lifecycle tasks
//!
//! # Example
//! ```ignore
//! use chat_relay::{ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = ChatServer::new(ServerConfig::default());
//!     let listener = server.bind().await.unwrap();
//!     server.serve(listener, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await.unwrap();
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use broadcast::Broadcaster;
pub use config::{ServerConfig, SessionConfig};
pub use error::{ServerError, SessionError};
pub use lifecycle::{handle_connection, teardown};
pub use message::{Announcement, SERVER_PREFIX};
pub use registry::Registry;
pub use server::ChatServer;
pub use session::{Session, SessionReader};
pub use types::{SessionId, SessionState};
