use access_log_mcp::config::AnalyzerConfig;
use access_log_mcp::tools::AccessLogServer;
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::{self, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging to stderr (so it doesn't interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AnalyzerConfig::from_env()?;
    tracing::info!(?config, "Starting Access Log MCP Server");

    let server = AccessLogServer::new(config);

    // Serve over stdio
    let service = server.serve((stdin(), stdout())).await?;

    // Wait for the service to complete
    service.waiting().await?;

    Ok(())
}
