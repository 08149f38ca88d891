//! MCP server connections and the tool executors backed by them
//!
//! [`McpClientManager::connect`] opens one session per configured server,
//! wiring each transport to a [`JsonRpcClient`] through a pair of bridge
//! tasks:
//!
//! ```text
//! JsonRpcClient --out_tx--> outbound bridge --send()--> Transport
//!                <--sent---
//! Transport --receive()--> inbound bridge --in_tx--> start_read_loop
//! ```
//!
//! The outbound bridge reports every send result back to the waiting
//! request. When the transport's inbound stream ends, or a call fails at the
//! transport level, the session is marked closed. The next tool call on that
//! server then opens a fresh connection and repeats the handshake.
//!
//! [`McpClientManager::shutdown`] cancels every session, waits for the
//! bridge tasks and closes each transport.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AgentApiError, Result};
use crate::mcp::client::{start_read_loop, JsonRpcClient, Outbound};
use crate::mcp::config::{McpServerConfig, McpTransportKind};
use crate::mcp::protocol::{InitializedMcpProtocol, McpProtocol};
use crate::mcp::transport::http::{HttpTransport, SESSION_EXPIRED};
use crate::mcp::transport::sse::SseTransport;
use crate::mcp::transport::Transport;
use crate::mcp::types::{ClientCapabilities, Implementation, McpTool};
use crate::tools::{ToolExecutor, ToolRegistry, ToolResult};

/// A negotiated session with one named MCP server.
#[derive(Debug)]
pub struct McpServerConnection {
    name: String,
    session: InitializedMcpProtocol,
    transport: Arc<dyn Transport>,
    /// Cancelled when the session is closed or its transport goes away.
    cancellation: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl McpServerConnection {
    /// Wire `transport` to a JSON-RPC client and run the MCP handshake.
    ///
    /// The session stops when `cancellation` is cancelled, when
    /// [`close`](Self::close) is called, or when the transport's inbound
    /// stream ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails or times out; the transport is
    /// closed first.
    pub async fn establish(
        name: &str,
        transport: Arc<dyn Transport>,
        timeout: Duration,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let cancellation = cancellation.child_token();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outbound>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        let shared = Arc::new(JsonRpcClient::new(name, out_tx));
        let read_loop = start_read_loop(in_rx, cancellation.clone(), Arc::clone(&shared));

        let outbound = Arc::clone(&transport);
        let token = cancellation.clone();
        let server = name.to_string();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = out_rx.recv() => match msg {
                        Some(Outbound { message, sent }) => {
                            let result = outbound.send(message).await;
                            match sent {
                                Some(sent) => {
                                    // The request may already have timed out.
                                    let _ = sent.send(result);
                                }
                                None => {
                                    if let Err(e) = result {
                                        warn!(server = %server, "Failed to send MCP message: {e}");
                                    }
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        let inbound = Arc::clone(&transport);
        let token = cancellation.clone();
        let server = name.to_string();
        let reader = tokio::spawn(async move {
            let mut stream = inbound.receive();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = stream.next() => match msg {
                        Some(msg) => {
                            if in_tx.send(msg).is_err() {
                                break;
                            }
                        }
                        None => {
                            warn!(server = %server, "MCP transport stream ended; closing session");
                            token.cancel();
                            break;
                        }
                    },
                }
            }
        });

        let tasks = Mutex::new(vec![read_loop, writer, reader]);

        let session = match McpProtocol::new(shared.clone_shared())
            .with_request_timeout(timeout)
            .initialize(Implementation::this_client(), ClientCapabilities::default())
            .await
        {
            Ok(session) => session,
            Err(e) => {
                cancellation.cancel();
                transport.close().await;
                return Err(e);
            }
        };

        transport
            .set_protocol_version(session.protocol_version())
            .await;

        Ok(Self {
            name: name.to_string(),
            session,
            transport,
            cancellation,
            tasks,
        })
    }

    /// Configured server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Protocol revision negotiated with the server.
    pub fn protocol_version(&self) -> &str {
        self.session.protocol_version()
    }

    /// True once the session was closed or its transport went away.
    pub fn is_closed(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// All tools the server offers.
    ///
    /// # Errors
    ///
    /// Returns an error if `tools/list` fails.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.session.list_tools().await
    }

    /// Stop the background tasks, wait for them, then close the transport.
    pub async fn close(&self) {
        self.cancellation.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            let _ = task.await;
        }
        self.transport.close().await;
    }
}

/// One configured server and its current session.
#[derive(Debug)]
struct ManagedServer {
    name: String,
    /// Absent for adopted connections, which cannot be reopened.
    config: Option<McpServerConfig>,
    current: Mutex<Arc<McpServerConnection>>,
}

impl ManagedServer {
    fn new(connection: McpServerConnection, config: Option<McpServerConfig>) -> Self {
        Self {
            name: connection.name().to_string(),
            config,
            current: Mutex::new(Arc::new(connection)),
        }
    }

    /// The live session, reconnecting first if the last one closed.
    async fn connection(&self) -> Result<Arc<McpServerConnection>> {
        let mut current = self.current.lock().await;
        if !current.is_closed() {
            return Ok(Arc::clone(&current));
        }

        let Some(config) = &self.config else {
            return Err(AgentApiError::McpTransport(format!(
                "session with MCP server '{}' is closed",
                self.name
            ))
            .into());
        };

        info!("Reconnecting to MCP server '{}' at {}", self.name, config.url);
        current.close().await;
        let connection = Arc::new(connect_server(config).await?);
        info!(
            "Reconnected to MCP server '{}' (protocol {})",
            self.name,
            connection.protocol_version()
        );
        *current = Arc::clone(&connection);
        Ok(connection)
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let connection = self.connection().await?;
        connection.list_tools().await
    }

    async fn close(&self) {
        self.current.lock().await.close().await;
    }
}

/// Owns every MCP session opened at startup.
#[derive(Debug, Default)]
pub struct McpClientManager {
    servers: Vec<Arc<ManagedServer>>,
}

impl McpClientManager {
    /// Connect to every configured server, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first server that cannot be reached or initialized; the
    /// sessions opened before it are closed.
    pub async fn connect(servers: &[McpServerConfig]) -> Result<Self> {
        let mut manager = Self::default();

        for server in servers {
            info!("Connecting to MCP server '{}' at {}", server.name, server.url);
            match connect_server(server).await {
                Ok(connection) => {
                    info!(
                        "Connected to MCP server '{}' (protocol {})",
                        connection.name(),
                        connection.protocol_version()
                    );
                    manager
                        .servers
                        .push(Arc::new(ManagedServer::new(connection, Some(server.clone()))));
                }
                Err(e) => {
                    manager.shutdown().await;
                    return Err(e.context(format!(
                        "Failed to connect to MCP server '{}' at {}",
                        server.name, server.url
                    )));
                }
            }
        }

        Ok(manager)
    }

    /// Adopt an already established connection.
    ///
    /// The manager has no configuration for it, so it is not reopened once
    /// it closes.
    pub fn push(&mut self, connection: McpServerConnection) {
        self.servers.push(Arc::new(ManagedServer::new(connection, None)));
    }

    /// Names of the managed servers, in configuration order.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name.as_str()).collect()
    }

    /// List every server's tools and register them, in server order.
    ///
    /// A name already taken by an earlier server keeps the earlier tool.
    ///
    /// # Errors
    ///
    /// Returns an error if any server fails to list its tools.
    pub async fn load_tools(&self) -> Result<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for server in &self.servers {
            let tools = server.list_tools().await.map_err(|e| {
                e.context(format!(
                    "Failed to list tools from MCP server '{}'",
                    server.name
                ))
            })?;
            debug!("MCP server '{}' offers {} tools", server.name, tools.len());
            for tool in tools {
                let name = tool.name.clone();
                let executor = McpToolExecutor {
                    server: Arc::clone(server),
                    tool,
                };
                registry.register(name, Arc::new(executor));
            }
        }
        Ok(registry)
    }

    /// Close every session and wait for each transport to shut down.
    pub async fn shutdown(&self) {
        for server in &self.servers {
            server.close().await;
        }
    }
}

async fn connect_server(server: &McpServerConfig) -> Result<McpServerConnection> {
    let url = url::Url::parse(&server.url).map_err(|e| {
        AgentApiError::Config(format!(
            "Invalid URL for MCP server '{}': {e}",
            server.name
        ))
    })?;
    let timeout = Duration::from_secs(server.timeout_seconds);

    let transport: Arc<dyn Transport> = match server.transport {
        McpTransportKind::Sse => {
            Arc::new(SseTransport::connect(url, server.headers.clone(), timeout).await?)
        }
        McpTransportKind::StreamableHttp => {
            Arc::new(HttpTransport::new(url, server.headers.clone(), timeout)?)
        }
    };

    McpServerConnection::establish(&server.name, transport, timeout, CancellationToken::new())
        .await
}

/// True when `error` means the session itself is unusable.
fn session_lost(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<AgentApiError>() {
        Some(AgentApiError::McpTransport(_)) => true,
        Some(AgentApiError::Mcp(message)) => message == SESSION_EXPIRED,
        _ => false,
    }
}

/// A remote MCP tool exposed to the agent.
pub struct McpToolExecutor {
    server: Arc<ManagedServer>,
    tool: McpTool,
}

impl McpToolExecutor {
    /// Server the tool lives on.
    pub fn server(&self) -> &str {
        &self.server.name
    }
}

#[async_trait::async_trait]
impl ToolExecutor for McpToolExecutor {
    fn tool_definition(&self) -> Value {
        let parameters = match &self.tool.input_schema {
            Value::Object(schema) if !schema.is_empty() => Value::Object(schema.clone()),
            _ => serde_json::json!({"type": "object", "properties": {}}),
        };
        serde_json::json!({
            "name": self.tool.name,
            "description": self.tool.description.clone().unwrap_or_default(),
            "parameters": parameters,
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult> {
        debug!(server = %self.server.name, "Calling MCP tool {}", self.tool.name);
        let connection = self.server.connection().await?;
        let arguments = (!args.is_null()).then_some(args);

        let response = match connection.session.call_tool(&self.tool.name, arguments).await {
            Ok(response) => response,
            Err(e) => {
                if session_lost(&e) {
                    warn!(server = %self.server.name, "MCP session lost: {e}");
                    connection.cancellation.cancel();
                }
                return Err(e);
            }
        };

        let text = response.text();
        if response.is_error() {
            Ok(ToolResult::error(text))
        } else {
            Ok(ToolResult::success(text))
        }
    }
}
