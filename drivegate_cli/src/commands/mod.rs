pub mod call;
pub mod config;
pub mod serve;
pub mod tools;

use drivegate_core::{GatewayConfig, GatewayError};
use thiserror::Error;

use crate::cli::Cli;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tool failed: {0}")]
    ToolFailed(String),

    #[error("{0}")]
    Core(#[from] GatewayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;

pub fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    Ok(GatewayConfig::load(cli.config.as_deref())?)
}
