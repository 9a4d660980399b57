//! syncpad — collaborative page-editing backend with real-time sync
//!
//! Usage:
//!   syncpad [--config syncpad.toml] [--host 0.0.0.0] [--port 8000]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use syncpad_core::Config;
use syncpad_gateway::GatewayServer;
use syncpad_store::Store;

#[derive(Debug, Parser)]
#[command(name = "syncpad", version, about = "Collaborative page-editing backend")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the SQLite database path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    info!("syncpad v{} starting", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(Store::open(&config.database.path)?);
    let seeded = store.seed_default_cards().await?;
    if seeded > 0 {
        info!("Seeded {seeded} default project cards");
    }

    GatewayServer::new(config, store).run().await?;
    Ok(())
}
