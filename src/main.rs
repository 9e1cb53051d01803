//! delta-sync demo server: serves the `/ws` synchronization endpoint over
//! a single in-memory `House` document.

use clap::Parser;
use delta_sync::api::{start_server, AppState};
use delta_sync::core::config::Config;
use delta_sync::model::House;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "delta-sync-server", version, about = "delta-sync demo server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    delta_sync::init()?;

    let config = Config::load(cli.config.as_deref())?;
    info!(bind_addr = %config.server.bind_addr, "configuration loaded");

    let state = AppState::new(House::new("Main St", 1));
    let bind_addr = config.server.bind_addr;

    let server_handle = tokio::spawn(async move { start_server(bind_addr, state).await });

    tokio::select! {
        _ = signal::ctrl_c() => {
            warn!("received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => warn!("server exited"),
                Ok(Err(err)) => warn!(error = %err, "server failed"),
                Err(err) => warn!(error = %err, "server task panicked"),
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}
