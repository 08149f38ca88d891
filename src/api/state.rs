//! Shared application state
//!
//! The configuration snapshot is fixed at construction. The agent context
//! is written once by the startup task and read by every request after
//! that.

use tokio::sync::OnceCell;

use crate::bootstrap::AgentContext;
use crate::config::Config;
use crate::error::{AgentApiError, Result};

/// State injected into every handler
pub struct AppState {
    /// Configured model identifier
    pub model: String,
    /// Configured inference endpoint
    pub endpoint: String,
    /// URL of the first configured MCP server
    pub mcp_server: Option<String>,
    context: OnceCell<AgentContext>,
}

impl AppState {
    /// Snapshot the values reported by `GET /config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.provider.model.clone().unwrap_or_default(),
            endpoint: config.provider.endpoint.clone().unwrap_or_default(),
            mcp_server: config.mcp.primary_url().map(str::to_string),
            context: OnceCell::new(),
        }
    }

    /// The agent context, once startup has finished
    pub fn context(&self) -> Option<&AgentContext> {
        self.context.get()
    }

    /// True once the agent context has been published
    pub fn is_ready(&self) -> bool {
        self.context.initialized()
    }

    /// Publish the agent context
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Config` if a context was already published
    pub fn publish(&self, context: AgentContext) -> Result<()> {
        self.context.set(context).map_err(|_| {
            AgentApiError::Config("agent context already initialized".to_string()).into()
        })
    }

    /// Number of loaded tools, zero before startup completes
    pub fn tools_loaded(&self) -> usize {
        self.context().map_or(0, |c| c.tools.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::config::AgentConfig;
    use crate::test_utils::{test_config, MockProvider};
    use crate::tools::{ToolDescriptor, ToolRegistry};

    fn context() -> AgentContext {
        AgentContext {
            agent: Agent::new(
                MockProvider::default(),
                ToolRegistry::new(),
                AgentConfig::default(),
            )
            .unwrap(),
            tools: vec![ToolDescriptor {
                name: "get_current_weather".to_string(),
                description: String::new(),
            }],
        }
    }

    #[test]
    fn test_from_config_snapshots_values() {
        let state = AppState::from_config(&test_config());
        assert_eq!(state.model, "llama3.2:3b");
        assert_eq!(state.endpoint, "http://127.0.0.1:9/v1/openai/v1");
        assert_eq!(state.mcp_server.as_deref(), Some("http://127.0.0.1:9/sse"));
        assert!(!state.is_ready());
        assert_eq!(state.tools_loaded(), 0);
    }

    #[test]
    fn test_publish_once() {
        let state = AppState::from_config(&test_config());
        state.publish(context()).unwrap();
        assert!(state.is_ready());
        assert_eq!(state.tools_loaded(), 1);
        assert!(state.publish(context()).is_err());
    }
}
