//! ChatServer: the connection acceptor
//!
//! Owns the registry and broadcaster and spawns one lifecycle task per
//! accepted connection. Per-connection failures stay inside their task.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lifecycle::handle_connection;
use crate::registry::Registry;

/// Pause after an accept error that is not a per-connection hiccup
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive non-transient accept errors before giving up
const MAX_CONSECUTIVE_ACCEPT_FAILURES: u32 = 64;

/// The chat relay server
pub struct ChatServer {
    config: ServerConfig,
    broadcaster: Broadcaster,
}

impl ChatServer {
    /// Create a server with an empty registry
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            broadcaster: Broadcaster::new(Registry::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        self.broadcaster.registry()
    }

    /// Bind the configured listening address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Bind and serve until Ctrl-C
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        if let Ok(addr) = listener.local_addr() {
            info!("Chat relay listening on {}", addr);
        }

        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections until `shutdown` resolves
    ///
    /// Shutdown only stops accepting; sessions already running continue
    /// until their own I/O ends.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut consecutive_failures = 0u32;

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    consecutive_failures = 0;
                    info!("A new client has connected from {}", addr);

                    let broadcaster = self.broadcaster.clone();
                    let config = self.config.session.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(stream, addr.to_string(), broadcaster, config).await
                        {
                            debug!("Discarded connection from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) if is_transient(&e) => {
                    warn!("Accept failed for one connection: {}", e);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    error!(
                        "Failed to accept connection ({} in a row): {}",
                        consecutive_failures, e
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_ACCEPT_FAILURES {
                        return Err(ServerError::ListenerFatal(e));
                    }
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

/// Errors that concern a single pending connection, not the listener
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
