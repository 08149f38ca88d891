//! mcp-agent-api - HTTP front end for an MCP tool-calling agent
//!
#![doc = "Main entry point for the mcp-agent-api service."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_agent_api::api::start_server;
use mcp_agent_api::cli::{Cli, LogFormat};
use mcp_agent_api::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    init_tracing(&cli);

    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;
    config.validate()?;

    start_server(config).await
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "mcp_agent_api=debug"
    } else {
        "mcp_agent_api=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cli.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
