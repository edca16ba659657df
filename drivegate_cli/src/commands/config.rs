use drivegate_core::config::{default_config_path, CONFIG_HELP};
use drivegate_core::GatewayConfig;
use owo_colors::OwoColorize;

use crate::cli::{Cli, ConfigAction, OutputFormat};
use crate::commands::{load_config, CommandError, Result};

const REDACTED: &str = "********";

pub fn run(cli: &Cli, action: ConfigAction) -> Result<()> {
    let config = load_config(cli)?;
    match action {
        ConfigAction::Check => check(cli, &config),
        ConfigAction::Show => show(cli, &config),
    }
}

fn check(cli: &Cli, config: &GatewayConfig) -> Result<()> {
    let path = cli.config.clone().or_else(default_config_path);
    match path {
        Some(p) if p.exists() => println!("{} {}", "Config file:".bold(), p.display()),
        Some(p) => println!(
            "{} {} {}",
            "Config file:".bold(),
            p.display(),
            "(not found, using environment)".dimmed()
        ),
        None => println!("{} {}", "Config file:".bold(), "none".dimmed()),
    }

    let missing = config.missing_credentials();
    if missing.is_empty() {
        let mode = if config.credentials.access_token.is_some() {
            "static bearer token"
        } else {
            "client credentials"
        };
        println!("{} Graph credentials ({})", "✓".green(), mode);
    } else {
        for var in &missing {
            println!("{} {} is not set", "✗".red(), var.bold());
        }
    }
    if config.server.api_key.is_none() {
        println!(
            "{} MCP_API_KEY is not set; the HTTP gateway will accept unauthenticated requests",
            "!".yellow()
        );
    }

    if let Err(e) = config.validate() {
        println!();
        println!("{}", CONFIG_HELP.dimmed());
        return Err(CommandError::InvalidConfig(e.to_string()));
    }
    println!("{}", "Configuration OK".green().bold());
    Ok(())
}

fn show(cli: &Cli, config: &GatewayConfig) -> Result<()> {
    let mut redacted = config.clone();
    for secret in [
        &mut redacted.credentials.client_secret,
        &mut redacted.credentials.access_token,
        &mut redacted.server.api_key,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    let rendered = if cli.output == OutputFormat::Json {
        serde_json::to_string(&redacted)?
    } else {
        serde_json::to_string_pretty(&redacted)?
    };
    println!("{}", rendered);
    Ok(())
}
