//! MCP client configuration types
//!
//! Describes the named MCP servers the agent connects to at startup and the
//! transport each one speaks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Name of the server created from `MCP_WEATHER_SERVER_URL`.
pub const WEATHER_SERVER_NAME: &str = "weather";

/// Wire transport used to reach an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpTransportKind {
    /// Legacy HTTP+SSE: a GET event stream plus POSTs to an announced endpoint.
    #[default]
    Sse,
    /// Streamable HTTP: every message is a POST, replies as JSON or SSE.
    #[serde(alias = "streamable-http", alias = "http")]
    StreamableHttp,
}

impl std::fmt::Display for McpTransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sse => write!(f, "sse"),
            Self::StreamableHttp => write!(f, "streamable_http"),
        }
    }
}

/// Connection settings for a single named MCP server.
///
/// # Examples
///
/// ```
/// use mcp_agent_api::mcp::config::{McpServerConfig, McpTransportKind};
///
/// let yaml = "name: weather\nurl: http://localhost:8000/sse\n";
/// let server: McpServerConfig = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!(server.transport, McpTransportKind::Sse);
/// assert_eq!(server.timeout_seconds, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Logical server name used in logs and error messages.
    pub name: String,

    /// Server URL. For `sse` this is the event-stream URL, for
    /// `streamable_http` the single MCP endpoint.
    pub url: String,

    /// Transport to use.
    #[serde(default)]
    pub transport: McpTransportKind,

    /// Per-request JSON-RPC timeout in seconds.
    #[serde(default = "default_mcp_timeout")]
    pub timeout_seconds: u64,

    /// Extra HTTP headers sent with every request (e.g. `Authorization`).
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_mcp_timeout() -> u64 {
    30
}

impl McpServerConfig {
    /// Build a server entry with default transport and timeout.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            transport: McpTransportKind::default(),
            timeout_seconds: default_mcp_timeout(),
            headers: HashMap::new(),
        }
    }
}

/// MCP client configuration
///
/// Defaults to no servers; the weather server is normally supplied through
/// `MCP_WEATHER_SERVER_URL`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Servers to connect to, in order.
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,

    /// Treat an empty tool list as a startup failure.
    #[serde(default)]
    pub require_tools: bool,
}

impl McpConfig {
    /// Set the URL of the named server, creating it with defaults if absent.
    pub fn upsert_server_url(&mut self, name: &str, url: impl Into<String>) {
        let url = url.into();
        match self.servers.iter_mut().find(|s| s.name == name) {
            Some(server) => server.url = url,
            None => self.servers.push(McpServerConfig::new(name, url)),
        }
    }

    /// URL of the first configured server, reported by `GET /config`.
    pub fn primary_url(&self) -> Option<&str> {
        self.servers.first().map(|s| s.url.as_str())
    }
}
