//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use arena::DebateConfig;
use clap::Parser;

/// Debate arena server
#[derive(Debug, Clone, Parser)]
#[command(name = "arena-server", version, about = "HTTP/WebSocket control surface for live debates")]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "ARENA_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    #[arg(long, env = "ARENA_PORT", default_value_t = 8787)]
    pub port: u16,

    /// Base URL of the agent service (`POST <url>/turn`)
    #[arg(long, env = "ARENA_AGENT_URL", default_value = "http://127.0.0.1:9000")]
    pub agent_url: String,

    /// Base URL of the moderator service (`POST <url>/step`, `<url>/summary`)
    #[arg(long, env = "ARENA_MODERATOR_URL", default_value = "http://127.0.0.1:9000")]
    pub moderator_url: String,

    /// Directory for finished-debate records. History is kept in memory when unset.
    #[arg(long, env = "ARENA_HISTORY_DIR")]
    pub history_dir: Option<PathBuf>,

    /// Default round ceiling for new debates
    #[arg(long, env = "ARENA_MAX_ROUNDS", default_value_t = 5)]
    pub max_rounds: u32,

    /// Moderator iterations allowed per round
    #[arg(long, env = "ARENA_MODERATOR_MAX_ITERATIONS", default_value_t = 6)]
    pub moderator_max_iterations: u32,

    #[arg(long, env = "ARENA_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins, comma separated. Any origin when empty.
    #[arg(long, env = "ARENA_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl ServerArgs {
    pub fn debate_config(&self) -> DebateConfig {
        DebateConfig {
            max_rounds: self.max_rounds,
            moderator_max_iterations: self.moderator_max_iterations,
            ..DebateConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.bind, self.port))
    }
}
