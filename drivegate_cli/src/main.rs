use clap::Parser;
use owo_colors::OwoColorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose > 0 {
        "drivegate=debug,drivegate_core=debug"
    } else {
        "drivegate=info,drivegate_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Serve { host, port } => serve::run(&cli, host.as_deref(), *port).await,
        Commands::Tools => tools::run(&cli),
        Commands::Call { tool, args, params } => {
            call::run(&cli, tool, args.as_deref(), params).await
        }
        Commands::Config { action } => config::run(&cli, *action),
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        process::exit(1);
    }
}
