mod logging;
mod lsp;
mod mcp_server;
mod terraform;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

use logging::{LogConfig, init_logging};
use mcp_server::McpServer;
use terraform::TerraformClient;

/// CLI arguments for the Terraform MCP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the terraform-ls executable (overrides TERRAFORM_LS_PATH env var)
    #[arg(long, value_name = "PATH")]
    terraform_ls_path: Option<String>,

    /// Log level (overrides RUST_LOG env var)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log file path (overrides MCP_LOG_FILE env var)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server on stdio
    Serve,
}

/// Resolve the terraform-ls binary from CLI args and environment.
/// Priority: CLI arg > TERRAFORM_LS_PATH env var > "terraform-ls" default.
fn resolve_server_path(arg: Option<String>) -> String {
    arg.or_else(|| std::env::var("TERRAFORM_LS_PATH").ok())
        .unwrap_or_else(|| "terraform-ls".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_config =
        LogConfig::from_env().with_overrides(args.log_level.clone(), args.log_file.clone());
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    match args.command {
        Command::Serve => serve(resolve_server_path(args.terraform_ls_path)).await,
    }
}

async fn serve(server_path: String) -> Result<(), Box<dyn std::error::Error>> {
    info!("using terraform-ls: {server_path}");

    let bridge = TerraformClient::start(&server_path)?;
    let server = McpServer::new(bridge);

    info!("Terraform MCP server ready and listening for requests");

    let stdin = BufReader::new(tokio::io::stdin());
    let outcome = server.run(stdin, tokio::io::stdout()).await;

    server.bridge().close().await;
    info!("server shutdown");

    outcome.map_err(Into::into)
}
