use std::sync::Arc;

use anyhow::Context;
use mal_mcp::{build_server, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = Settings::from_env().context("loading configuration")?;
    let server = build_server(settings).context("building server")?;

    tracing::info!(tools = server.tool_count(), "serving MCP over stdio");
    Arc::new(server).run_stdio().await?;
    tracing::info!("stdin closed, shutting down");

    Ok(())
}
