//! Typed MCP lifecycle wrapper over [`JsonRpcClient`]
//!
//! Two types model the two phases of a client session:
//!
//! - [`McpProtocol`] is an uninitialized session. [`McpProtocol::initialize`]
//!   performs the `initialize` / `notifications/initialized` handshake.
//! - [`InitializedMcpProtocol`] is a negotiated session exposing the tool
//!   methods the agent needs.
//!
//! Neither type owns a transport; the connection manager wires channels
//! externally and passes the resulting [`JsonRpcClient`] into
//! [`McpProtocol::new`].

use std::time::Duration;

use crate::error::{AgentApiError, Result};
use crate::mcp::client::JsonRpcClient;
use crate::mcp::types::{
    CallToolParams, CallToolResponse, ClientCapabilities, Implementation, InitializeParams,
    InitializeResponse, ListToolsResponse, McpTool, PaginatedParams, LATEST_PROTOCOL_VERSION,
    METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_PING, METHOD_TOOLS_CALL, METHOD_TOOLS_LIST,
    SUPPORTED_PROTOCOL_VERSIONS,
};

/// An uninitialized MCP client session.
///
/// # Examples
///
/// ```
/// use tokio::sync::mpsc;
/// use mcp_agent_api::mcp::client::{JsonRpcClient, Outbound};
/// use mcp_agent_api::mcp::protocol::McpProtocol;
///
/// let (tx, _rx) = mpsc::unbounded_channel::<Outbound>();
/// let _proto = McpProtocol::new(JsonRpcClient::new("weather", tx));
/// ```
#[derive(Debug)]
pub struct McpProtocol {
    client: JsonRpcClient,
    request_timeout: Option<Duration>,
}

impl McpProtocol {
    /// Create a new uninitialized session.
    ///
    /// The caller must already have started
    /// [`crate::mcp::client::start_read_loop`] on a client sharing state
    /// with `client`.
    pub fn new(client: JsonRpcClient) -> Self {
        Self {
            client,
            request_timeout: None,
        }
    }

    /// Per-request timeout applied to every call on this session.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Perform the MCP handshake.
    ///
    /// Proposes [`LATEST_PROTOCOL_VERSION`], checks that the server picked a
    /// revision from [`SUPPORTED_PROTOCOL_VERSIONS`], then sends
    /// `notifications/initialized`.
    ///
    /// # Errors
    ///
    /// - [`AgentApiError::McpProtocolVersion`] if the server selected an
    ///   unsupported revision
    /// - [`AgentApiError::McpTimeout`] if the server does not answer in time
    /// - [`AgentApiError::McpTransport`] if the outbound channel is closed
    pub async fn initialize(
        self,
        client_info: Implementation,
        capabilities: ClientCapabilities,
    ) -> Result<InitializedMcpProtocol> {
        let response: InitializeResponse = self
            .client
            .request(
                METHOD_INITIALIZE,
                InitializeParams {
                    protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
                    capabilities,
                    client_info,
                },
                self.request_timeout,
            )
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&response.protocol_version.as_str()) {
            return Err(AgentApiError::McpProtocolVersion {
                expected: SUPPORTED_PROTOCOL_VERSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                got: response.protocol_version,
            }
            .into());
        }

        self.client.notify(METHOD_INITIALIZED, serde_json::Value::Null)?;

        Ok(InitializedMcpProtocol {
            client: self.client,
            request_timeout: self.request_timeout,
            initialize_response: response,
        })
    }
}

/// A fully negotiated MCP client session.
#[derive(Debug)]
pub struct InitializedMcpProtocol {
    client: JsonRpcClient,
    request_timeout: Option<Duration>,
    /// The server's answer to `initialize`.
    pub initialize_response: InitializeResponse,
}

impl InitializedMcpProtocol {
    /// Protocol revision the server selected.
    pub fn protocol_version(&self) -> &str {
        &self.initialize_response.protocol_version
    }

    /// Server identity reported during the handshake.
    pub fn server_info(&self) -> &Implementation {
        &self.initialize_response.server_info
    }

    /// List every tool the server offers, following `nextCursor` until the
    /// server stops returning one.
    ///
    /// # Errors
    ///
    /// Returns an error if any paged request fails.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let resp: ListToolsResponse = self
                .client
                .request(
                    METHOD_TOOLS_LIST,
                    PaginatedParams { cursor },
                    self.request_timeout,
                )
                .await?;

            tools.extend(resp.tools);

            match resp.next_cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(tools)
    }

    /// Invoke a named tool on the server.
    ///
    /// A tool that fails on the server side usually comes back as a normal
    /// response with `isError: true`; only protocol failures are `Err`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// JSON-RPC error.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<CallToolResponse> {
        self.client
            .request(
                METHOD_TOOLS_CALL,
                CallToolParams {
                    name: name.to_string(),
                    arguments,
                },
                self.request_timeout,
            )
            .await
    }

    /// Send a `ping` and wait for the empty reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer.
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self
            .client
            .request(METHOD_PING, serde_json::json!({}), self.request_timeout)
            .await?;
        Ok(())
    }
}
