use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drivegate_core::{
    mcp_server::{JsonRpcHandler, McpServer},
    transport::StdioTransport,
    Gateway, GatewayConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries protocol messages only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivegate_mcp=info,drivegate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting drivegate MCP server");

    let config = GatewayConfig::load(None)?;
    let gateway = match Gateway::from_config(&config) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            error!("Cannot start: {}", e);
            return Err(e.into());
        }
    };

    let handler = JsonRpcHandler::new(McpServer::new(gateway));
    let transport = StdioTransport::new(handler);

    info!("MCP server ready, listening on stdio");

    if let Err(e) = transport.run().await {
        error!("Transport error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
