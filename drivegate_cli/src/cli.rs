use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "drivegate")]
#[command(about = "drivegate - OneDrive operations over Microsoft Graph, as REST and MCP tools")]
#[command(version)]
#[command(after_help = "\x1b[1;36mQuick Start:\x1b[0m
  drivegate config check                  Verify Graph credentials are configured
  drivegate tools                         List the available tools
  drivegate call list_files -p folder_path=/Documents
  drivegate serve --port 8000             Run the HTTP gateway

\x1b[1;36mConfiguration:\x1b[0m
  CLIENT_ID, CLIENT_SECRET, TENANT_ID     Azure app registration (or GRAPH_ACCESS_TOKEN)
  MCP_API_KEY                             Shared secret for the HTTP gateway
  ~/.config/drivegate/config.toml         Optional file, overridden by .env and environment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP gateway (REST + JSON-RPC)
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  drivegate serve
  drivegate serve --host 127.0.0.1 --port 9000")]
    Serve {
        /// Listen address (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List available tools
    Tools,

    /// Invoke a single tool and print the result envelope
    #[command(after_help = "\x1b[1;33mExamples:\x1b[0m
  drivegate call list_files
  drivegate call search_files -p query=report -p limit=10
  drivegate call bulk_delete --args '{\"file_ids\": [\"A1\", \"B2\"]}'")]
    Call {
        /// Tool name (e.g., list_files, move_file)
        tool: String,
        /// JSON arguments (e.g., '{"query": "report"}')
        #[arg(long)]
        args: Option<String>,
        /// key=value argument; values that parse as JSON keep their type
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum ConfigAction {
    /// Validate configuration and list missing variables
    Check,
    /// Print the effective configuration with secrets redacted
    Show,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}
