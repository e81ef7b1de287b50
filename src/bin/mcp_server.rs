// Deployment Queue MCP server
// Serves the deployment tools to an MCP client over stdin/stdout

use anyhow::{Context, Result};
use tokio::io::BufReader;

use deployment_queue_cli::config::{self, Settings};
use deployment_queue_cli::mcp::McpServer;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    // stdout carries the protocol; logs must stay on stderr
    config::init_logging(&settings.log_level);

    tracing::info!(
        api_url = %settings.api_url,
        version = env!("CARGO_PKG_VERSION"),
        "Deployment Queue MCP server starting"
    );

    let server = McpServer::new(settings);
    server
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("MCP stdio transport failed")?;

    Ok(())
}
