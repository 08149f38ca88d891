//! mcp-agent-api - HTTP API for a tool-calling agent backed by MCP servers
//!
//! This library provides the pieces the `mcp-agent-api` binary is built
//! from: an OpenAI-compatible chat client, an MCP client that discovers
//! tools, the agent loop that combines them, and the axum HTTP facade.
//!
//! # Architecture
//!
//! - `config`: configuration loading and validation
//! - `providers`: chat model abstraction and the OpenAI-compatible client
//! - `mcp`: MCP sessions, transports and tool executors
//! - `tools`: tool abstraction and registry
//! - `agent`: the tool-calling execution loop
//! - `bootstrap`: one-time startup of the above
//! - `api`: HTTP endpoints, shared state and server lifecycle
//!
//! # Example
//!
//! ```no_run
//! use mcp_agent_api::{api, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     api::start_server(config).await
//! }
//! ```

pub mod agent;
pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prompts;
pub mod providers;
pub mod tools;

// Re-export commonly used types
pub use agent::Agent;
pub use bootstrap::AgentContext;
pub use config::Config;
pub use error::{AgentApiError, Result};

#[cfg(test)]
pub mod test_utils;
