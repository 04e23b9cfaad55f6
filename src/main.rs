//! Chat Relay - Entry Point
//!
//! Loads configuration, binds the listener and serves until Ctrl-C.

use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // CLI flags, then CHAT_RELAY_* variables, then defaults
    let config = ServerConfig::load();
    info!(
        "Starting chat relay on {} (outbound queue {} lines)",
        config.bind_addr(),
        config.session.outbound_capacity
    );

    ChatServer::new(config).run().await?;

    info!("Chat relay stopped");
    Ok(())
}
