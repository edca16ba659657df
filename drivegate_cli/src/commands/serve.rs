use drivegate_core::http::{self, AppState};
use drivegate_core::Gateway;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::commands::{load_config, Result};

pub async fn run(cli: &Cli, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(h) = host {
        config.server.host = h.to_string();
    }
    if let Some(p) = port {
        config.server.port = p;
    }

    let gateway = Arc::new(Gateway::from_config(&config)?);
    let state = AppState::new(gateway, config.server.api_key.clone());
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;

    println!(
        "{} http://{}:{}  {}",
        "drivegate".bold().cyan(),
        config.server.host,
        config.server.port,
        "(Ctrl-C to stop)".dimmed()
    );
    http::serve(listener, http::router(state), shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!("Cannot listen for Ctrl-C, shutting down: {}", e),
    }
}
