//! Error types for mcp-agent-api
//!
//! This module defines all error types used throughout the service,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for agent API operations
///
/// Covers configuration loading, chat model calls, the agent loop, MCP
/// sessions and the transports underneath them. Errors that reach the HTTP
/// facade are rendered with their `Display` text.
#[derive(Error, Debug)]
pub enum AgentApiError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Agent exceeded maximum iteration limit
    #[error("Agent exceeded maximum iterations: limit={limit}, {message}")]
    MaxIterationsExceeded {
        /// The configured iteration limit
        limit: usize,
        /// Additional context about the failure
        message: String,
    },

    /// Agent invocation did not finish before its deadline
    #[error("Agent execution timed out after {seconds} seconds")]
    Timeout {
        /// The configured deadline in seconds
        seconds: u64,
    },

    /// MCP protocol-level error (JSON-RPC error responses, expired sessions)
    #[error("MCP error: {0}")]
    Mcp(String),

    /// MCP transport failure (connection refused, closed channel, bad status)
    #[error("MCP transport error: {0}")]
    McpTransport(String),

    /// MCP request did not receive a response in time
    #[error("MCP timeout: server={server}, method={method}")]
    McpTimeout {
        /// Server the request was sent to
        server: String,
        /// JSON-RPC method that timed out
        method: String,
    },

    /// Server selected a protocol revision this client does not speak
    #[error("MCP protocol version mismatch: expected one of {expected:?}, got {got}")]
    McpProtocolVersion {
        /// Versions this client accepts
        expected: Vec<String>,
        /// Version the server returned
        got: String,
    },

    /// MCP server rejected the request as unauthorized
    #[error("MCP authentication required: {0}")]
    McpAuth(String),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for agent API operations
///
/// Uses `anyhow::Error` so callers can attach context while still being able
/// to downcast to [`AgentApiError`].
pub type Result<T> = anyhow::Result<T>;
