use anyhow::Result;
use clap::Parser;

use arena_server::config::ServerArgs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena=info,arena_server=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = ServerArgs::parse();
    arena_server::run(args).await
}
