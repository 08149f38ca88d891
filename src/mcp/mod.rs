//! MCP (Model Context Protocol) client support
//!
//! Connects to the configured MCP servers, discovers their tools and exposes
//! them to the agent as [`crate::tools::ToolExecutor`]s.
//!
//! # Module Layout
//!
//! - `types`     -- protocol types and JSON-RPC primitives
//! - `client`    -- transport-agnostic async JSON-RPC 2.0 client
//! - `protocol`  -- typed MCP lifecycle wrapper over `JsonRpcClient`
//! - `transport` -- `Transport` trait with SSE and Streamable HTTP
//!   implementations
//! - `config`    -- per-server configuration
//! - `manager`   -- server connections and tool executors

pub mod client;
pub mod config;
pub mod manager;
pub mod protocol;
pub mod transport;
pub mod types;

pub use manager::{McpClientManager, McpServerConnection, McpToolExecutor};
