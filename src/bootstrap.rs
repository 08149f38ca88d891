//! One-time startup of the agent and its collaborators
//!
//! Builds, in order, the chat model client, the MCP sessions, the tool list
//! and the agent, logging each step. Any failure aborts startup.

use tracing::{info, warn};

use crate::agent::Agent;
use crate::config::Config;
use crate::error::{AgentApiError, Result};
use crate::mcp::McpClientManager;
use crate::providers::{create_provider, Provider};
use crate::tools::ToolDescriptor;

/// Everything a query needs, published once after startup succeeds
pub struct AgentContext {
    /// The composed agent
    pub agent: Agent,
    /// Loaded tools, in discovery order
    pub tools: Vec<ToolDescriptor>,
}

/// Initialize the chat model client, MCP sessions and agent
///
/// Returns the context together with the manager that owns the MCP
/// sessions, so the caller can close them on shutdown.
///
/// # Errors
///
/// Returns an error if any step fails; sessions opened before the failure
/// are closed.
pub async fn bootstrap(config: &Config) -> Result<(AgentContext, McpClientManager)> {
    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!(
        "Endpoint: {}",
        config.provider.endpoint.as_deref().unwrap_or_default()
    );
    info!(
        "Model: {}",
        config.provider.model.as_deref().unwrap_or_default()
    );
    for server in &config.mcp.servers {
        info!(
            "MCP server '{}': {} ({})",
            server.name, server.url, server.transport
        );
    }

    let provider = create_provider(&config.provider)?;
    info!("LLM initialized");

    let manager = McpClientManager::connect(&config.mcp.servers).await?;

    match assemble(provider, &manager, config).await {
        Ok(context) => Ok((context, manager)),
        Err(e) => {
            manager.shutdown().await;
            Err(e)
        }
    }
}

/// Load tools from connected servers and compose the agent
///
/// # Errors
///
/// Returns an error if listing tools fails, if no tools were found while
/// `mcp.require_tools` is set, or if the agent limits are invalid.
pub async fn assemble(
    provider: Box<dyn Provider>,
    manager: &McpClientManager,
    config: &Config,
) -> Result<AgentContext> {
    let registry = manager.load_tools().await?;
    let tools = registry.descriptors();

    info!("Loaded {} tools", tools.len());
    for tool in &tools {
        info!("   - {}: {}", tool.name, tool.description);
    }

    if tools.is_empty() {
        if config.mcp.require_tools {
            return Err(AgentApiError::Config(
                "No tools were loaded from the MCP servers and mcp.require_tools is set"
                    .to_string(),
            )
            .into());
        }
        warn!("No tools were loaded; the agent will answer without tools");
    }

    let agent = Agent::new_boxed(provider, registry, config.agent.clone())?;
    info!("Agent created successfully");

    Ok(AgentContext { agent, tools })
}
