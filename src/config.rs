//! Server configuration
//!
//! Every setting can come from a CLI flag, a `CHAT_RELAY_*` environment
//! variable, or its built-in default, in that order of precedence. The
//! port may also be given as the first positional argument.

use std::time::Duration;

use clap::{Args, Parser};

/// Default listening host (all interfaces)
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listening port
pub const DEFAULT_PORT: u16 = 1234;

/// Default per-session outbound queue size, in lines
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Default maximum inbound line length, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

/// Per-session settings
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lines that may be queued for a recipient before it counts as a slow consumer
    #[arg(
        long,
        env = "CHAT_RELAY_OUTBOUND_CAPACITY",
        default_value_t = DEFAULT_OUTBOUND_CAPACITY,
        value_parser = parse_at_least_one
    )]
    pub outbound_capacity: usize,

    /// Longest accepted inbound line, in bytes
    #[arg(
        long,
        env = "CHAT_RELAY_MAX_LINE_LENGTH",
        default_value_t = DEFAULT_MAX_LINE_LENGTH,
        value_parser = parse_at_least_one
    )]
    pub max_line_length: usize,

    /// Seconds a new connection may take to send its username (no limit if unset)
    #[arg(
        long = "handshake-timeout",
        env = "CHAT_RELAY_HANDSHAKE_TIMEOUT_SECS",
        value_name = "SECS",
        value_parser = parse_timeout_secs
    )]
    pub handshake_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            handshake_timeout: None,
        }
    }
}

/// Line-oriented TCP chat relay
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "chat_relay", version, about = "Line-oriented TCP chat relay")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, env = "CHAT_RELAY_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(env = "CHAT_RELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[command(flatten)]
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the command line and environment
    ///
    /// Exits the process with clap's usage message on invalid input.
    pub fn load() -> Self {
        Self::parse()
    }

    /// Address string passed to `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_at_least_one(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(value) => Ok(value),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_timeout_secs(raw: &str) -> Result<Duration, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err("must be at least 1 second".to_string()),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(e.to_string()),
    }
}
