//! Transport-agnostic async JSON-RPC 2.0 client
//!
//! [`JsonRpcClient`] writes serialized requests to an outbound channel and
//! matches responses arriving on an inbound channel to the callers waiting
//! for them. The transport is wired to the two channels by the connection
//! manager; [`start_read_loop`] services the inbound side.
//!
//! - In-flight requests live in a `pending` map keyed by `u64` request ID,
//!   each holding the `oneshot::Sender` that completes the caller.
//! - Requests travel as [`Outbound`] with a `sent` channel. Whoever drives
//!   the transport reports the send result there, so a failed send fails the
//!   caller at once with the transport's own error.
//! - Server-initiated `ping` requests are answered with an empty result. Any
//!   other server request gets JSON-RPC `-32601`, because the agent offers
//!   no client-side capabilities.
//! - Notifications are logged at debug level and otherwise ignored.
//! - Cancelling the read loop's [`CancellationToken`] drops every pending
//!   sender so waiting callers fail instead of hanging.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentApiError, Result};
use crate::mcp::types::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND,
    METHOD_PING, NOTIF_MESSAGE,
};

/// Default timeout applied to every request when the caller does not specify one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The pending-response map type: maps request ID to the oneshot sender.
type PendingMap =
    HashMap<u64, oneshot::Sender<std::result::Result<serde_json::Value, JsonRpcError>>>;

/// One serialized message bound for the transport.
#[derive(Debug)]
pub struct Outbound {
    /// Serialized JSON-RPC message.
    pub message: String,
    /// Receives the result of handing `message` to the transport. Requests
    /// set it; notifications and replies do not.
    pub sent: Option<oneshot::Sender<Result<()>>>,
}

impl Outbound {
    fn untracked(message: String) -> Self {
        Self {
            message,
            sent: None,
        }
    }
}

/// Transport-agnostic async JSON-RPC 2.0 client.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use mcp_agent_api::mcp::client::{JsonRpcClient, Outbound, start_read_loop};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let (out_tx, _out_rx) = mpsc::unbounded_channel::<Outbound>();
///     let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
///     let token = CancellationToken::new();
///     let client = Arc::new(JsonRpcClient::new("weather", out_tx));
///     let _handle = start_read_loop(in_rx, token, Arc::clone(&client));
///     Ok(())
/// }
/// ```
pub struct JsonRpcClient {
    /// Name of the server on the other end, used in errors and logs.
    server_name: Arc<str>,
    /// Monotonically increasing request ID counter.
    next_id: Arc<AtomicU64>,
    /// In-flight requests waiting for a response.
    pending: Arc<Mutex<PendingMap>>,
    /// Channel used to send serialized JSON-RPC messages to the transport.
    outbound_tx: mpsc::UnboundedSender<Outbound>,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("server_name", &self.server_name)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Create a new client writing to `outbound_tx`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use mcp_agent_api::mcp::client::{JsonRpcClient, Outbound};
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel::<Outbound>();
    /// let client = JsonRpcClient::new("weather", tx);
    /// assert_eq!(client.server_name(), "weather");
    /// ```
    pub fn new(server_name: impl Into<String>, outbound_tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            server_name: Arc::from(server_name.into()),
            next_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            outbound_tx,
        }
    }

    /// Create a client that shares the pending map and ID counter with `self`.
    ///
    /// The read loop holds an `Arc<JsonRpcClient>` while the protocol layer
    /// owns its client by value; both must resolve the same pending map.
    pub fn clone_shared(&self) -> Self {
        Self {
            server_name: Arc::clone(&self.server_name),
            next_id: Arc::clone(&self.next_id),
            pending: Arc::clone(&self.pending),
            outbound_tx: self.outbound_tx.clone(),
        }
    }

    /// Name of the remote server.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Send a JSON-RPC request and await the typed response.
    ///
    /// # Errors
    ///
    /// - the transport's own error if the message could not be sent
    /// - [`AgentApiError::McpTransport`] if the outbound channel is closed or
    ///   the read loop exits before a response arrives
    /// - [`AgentApiError::McpTimeout`] if no response arrives within the timeout
    /// - [`AgentApiError::Mcp`] if the server returns an error response
    /// - [`AgentApiError::Serialization`] if (de)serialization fails
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<R>
    where
        P: serde::Serialize + Send,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Register before sending; the response may race the send.
        let (tx, mut rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let message = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.to_string(),
            params: Some(serde_json::to_value(params)?),
        })?;

        let (sent_tx, sent_rx) = oneshot::channel();
        let outbound = Outbound {
            message,
            sent: Some(sent_tx),
        };
        if self.outbound_tx.send(outbound).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AgentApiError::McpTransport("outbound channel closed".to_string()).into());
        }

        let deadline = timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let waited = tokio::time::timeout(deadline, async {
            tokio::select! {
                sent = sent_rx => {
                    match sent {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => return Err(e),
                        Err(_) => return Err(transport_error("message dropped before it was sent")),
                    }
                    (&mut rx).await.map_err(|_| read_loop_exited())
                }
                reply = &mut rx => reply.map_err(|_| read_loop_exited()),
            }
        })
        .await;

        let rpc_result = match waited {
            Ok(Ok(rpc_result)) => rpc_result,
            Ok(Err(e)) => {
                self.pending.lock().await.remove(&id);
                return Err(e);
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(AgentApiError::McpTimeout {
                    server: self.server_name.to_string(),
                    method: method.to_string(),
                }
                .into());
            }
        };

        let value = rpc_result.map_err(|e| AgentApiError::Mcp(e.message))?;

        serde_json::from_value(value).map_err(|e| AgentApiError::Serialization(e).into())
    }

    /// Send a JSON-RPC notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns [`AgentApiError::McpTransport`] if the outbound channel is closed.
    pub fn notify<P: serde::Serialize + Send>(&self, method: &str, params: P) -> Result<()> {
        let params = serde_json::to_value(params)?;
        let message = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: (!params.is_null()).then_some(params),
        })?;

        self.outbound_tx
            .send(Outbound::untracked(message))
            .map_err(|_| AgentApiError::McpTransport("outbound channel closed".to_string()))?;

        Ok(())
    }

    fn reply(&self, response: JsonRpcResponse) {
        match serde_json::to_string(&response) {
            Ok(serialized) => {
                if self.outbound_tx.send(Outbound::untracked(serialized)).is_err() {
                    tracing::debug!(server = %self.server_name, "Reply dropped: outbound channel closed");
                }
            }
            Err(e) => tracing::warn!(server = %self.server_name, "Failed to serialize reply: {e}"),
        }
    }
}

fn transport_error(reason: &str) -> anyhow::Error {
    AgentApiError::McpTransport(reason.to_string()).into()
}

fn read_loop_exited() -> anyhow::Error {
    transport_error("read loop exited before response arrived")
}

/// Start the JSON-RPC read loop as a background Tokio task.
///
/// Each inbound string is classified as a response, a server-initiated
/// request, or a notification and dispatched accordingly. The loop ends when
/// the token is cancelled or the inbound channel closes; either way pending
/// requests are failed.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
/// use mcp_agent_api::mcp::client::{start_read_loop, JsonRpcClient, Outbound};
///
/// #[tokio::main]
/// async fn main() {
///     let (out_tx, _out_rx) = mpsc::unbounded_channel::<Outbound>();
///     let (_in_tx, in_rx) = mpsc::unbounded_channel::<String>();
///     let token = CancellationToken::new();
///     let client = Arc::new(JsonRpcClient::new("weather", out_tx));
///     let handle = start_read_loop(in_rx, token.clone(), Arc::clone(&client));
///     token.cancel();
///     handle.await.unwrap();
/// }
/// ```
pub fn start_read_loop(
    mut inbound_rx: mpsc::UnboundedReceiver<String>,
    cancellation: CancellationToken,
    client: Arc<JsonRpcClient>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => break,

                maybe_msg = inbound_rx.recv() => match maybe_msg {
                    Some(raw) => dispatch_message(&raw, &client).await,
                    None => {
                        tracing::debug!(server = %client.server_name, "MCP inbound channel closed");
                        break;
                    }
                },
            }
        }
        client.pending.lock().await.clear();
    })
}

/// Classify and dispatch a single inbound JSON string.
async fn dispatch_message(raw: &str, client: &Arc<JsonRpcClient>) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(server = %client.server_name, "MCP read loop: failed to parse inbound JSON: {e}");
            return;
        }
    };

    let has_id = value.get("id").map(|id| !id.is_null()).unwrap_or(false);
    let has_method = value.get("method").is_some();
    let is_reply = value.get("result").is_some() || value.get("error").is_some();

    match (has_id, has_method) {
        (true, false) if is_reply => handle_response(value, client).await,
        (true, true) => handle_server_request(value, client),
        (false, true) => handle_notification(&value, client),
        _ => tracing::debug!(
            server = %client.server_name,
            "MCP read loop: ignoring unclassifiable message"
        ),
    }
}

/// Resolve a pending request sender with the response value or error.
async fn handle_response(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let id_val = &value["id"];
    let id = match id_val
        .as_u64()
        .or_else(|| id_val.as_str().and_then(|s| s.parse().ok()))
    {
        Some(id) => id,
        None => {
            tracing::warn!("MCP read loop: response has non-integer id: {id_val}");
            return;
        }
    };

    let Some(tx) = client.pending.lock().await.remove(&id) else {
        tracing::debug!("MCP read loop: received response for unknown id {id}; ignoring");
        return;
    };

    let outcome = match value.get("error") {
        Some(error_val) => Err(serde_json::from_value::<JsonRpcError>(error_val.clone())
            .unwrap_or_else(|_| JsonRpcError {
                code: -32603,
                message: format!("malformed error object: {error_val}"),
                data: None,
            })),
        None => Ok(value.get("result").cloned().unwrap_or(serde_json::Value::Null)),
    };

    // The caller may already have timed out.
    let _ = tx.send(outcome);
}

/// Answer a server-initiated request.
fn handle_server_request(value: serde_json::Value, client: &Arc<JsonRpcClient>) {
    let method = value
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    let id = value.get("id").cloned();

    let response = if method == METHOD_PING {
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(serde_json::json!({})),
            error: None,
        }
    } else {
        tracing::debug!(server = %client.server_name, "Rejecting server request '{method}'");
        JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
                data: None,
            }),
        }
    };

    client.reply(response);
}

fn handle_notification(value: &serde_json::Value, client: &Arc<JsonRpcClient>) {
    let method = value
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    if method == NOTIF_MESSAGE {
        tracing::debug!(server = %client.server_name, "MCP server log: {}", value["params"]);
    } else {
        tracing::debug!(server = %client.server_name, "Ignoring MCP notification '{method}'");
    }
}
