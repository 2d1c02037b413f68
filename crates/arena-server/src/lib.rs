//! Debate arena server — HTTP control surface and WebSocket live streams
//!
//! Wires HTTP-backed agent and moderator providers into a
//! [`arena::DebateArena`] and exposes it over axum.

pub mod config;
pub mod error;
pub mod providers;
pub mod routes;
mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use arena::debate::{HistoryStore, InMemoryHistoryStore, JsonFileHistoryStore};
use arena::{DebateArena, SharedDebateArena};
use tokio::net::TcpListener;
use tracing::info;

use config::ServerArgs;
use providers::{HttpAgentProvider, HttpModeratorProvider};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub arena: SharedDebateArena,
}

/// Build the arena described by `args`.
pub fn build_arena(args: &ServerArgs) -> Result<SharedDebateArena> {
    let agents = HttpAgentProvider::new(&args.agent_url, args.request_timeout())
        .context("Failed to create agent HTTP client")?;
    let moderator = HttpModeratorProvider::new(&args.moderator_url, args.request_timeout())
        .context("Failed to create moderator HTTP client")?;
    let history: Arc<dyn HistoryStore> = match &args.history_dir {
        Some(dir) => Arc::new(JsonFileHistoryStore::new(dir)),
        None => Arc::new(InMemoryHistoryStore::new()),
    };

    Ok(DebateArena::builder(Arc::new(agents), Arc::new(moderator))
        .config(args.debate_config())
        .history(history)
        .build()
        .shared())
}

/// Serve until ctrl-c.
pub async fn run(args: ServerArgs) -> Result<()> {
    let addr = args.socket_addr()?;
    let state = AppState {
        arena: build_arena(&args)?,
    };
    let app = routes::router(state, &args.cors_origins);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(
        %addr,
        agent_url = %args.agent_url,
        moderator_url = %args.moderator_url,
        history_dir = ?args.history_dir,
        "Debate arena listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, stopping server...");
        })
        .await
        .context("Server error")
}
