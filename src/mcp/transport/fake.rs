//! In-process fake transport for MCP tests
//!
//! [`FakeTransport::new`] returns a transport plus a [`FakeTransportHandle`].
//! The code under test talks to the transport; the test either drives the
//! handle by hand or passes it to [`FakeTransportHandle::serve`], which runs a
//! scripted MCP server answering the handshake, `tools/list`, and
//! `tools/call`.
//!
//! ```text
//! client send() -----> outbound_tx -----> outbound_rx (handle reads)
//! handle inbound_tx -> inbound_tx  -----> inbound_rx  (client receive())
//! ```

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::{AgentApiError, Result};
use crate::mcp::transport::{receiver_stream, Transport};
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

/// In-process fake transport.
#[derive(Debug)]
pub struct FakeTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    negotiated: std::sync::Mutex<Option<String>>,
}

/// The test-side end of a [`FakeTransport`].
#[derive(Debug)]
pub struct FakeTransportHandle {
    /// Messages the client sent via [`Transport::send`].
    pub outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Messages pushed here come out of [`Transport::receive`].
    pub inbound_tx: mpsc::UnboundedSender<String>,
}

impl FakeTransport {
    /// Create a connected `(transport, handle)` pair.
    pub fn new() -> (Self, FakeTransportHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();

        let transport = Self {
            outbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
            negotiated: std::sync::Mutex::new(None),
        };
        let handle = FakeTransportHandle {
            outbound_rx,
            inbound_tx,
        };
        (transport, handle)
    }

    /// Protocol revision recorded through [`Transport::set_protocol_version`].
    pub fn negotiated_version(&self) -> Option<String> {
        self.negotiated.lock().unwrap().clone()
    }
}

impl FakeTransportHandle {
    /// Run a scripted MCP server on this handle until the client goes away.
    ///
    /// `tools` is the `tools/list` payload, served in a single page. A
    /// `tools/call` for a tool named `broken` answers `isError: true`;
    /// `slow` never answers; every other call echoes its name and arguments.
    pub fn serve(mut self, tools: serde_json::Value) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(raw) = self.outbound_rx.recv().await {
                let Ok(msg) = serde_json::from_str::<serde_json::Value>(&raw) else {
                    continue;
                };
                let Some(id) = msg.get("id").filter(|id| !id.is_null()).cloned() else {
                    continue;
                };
                let params = &msg["params"];

                let result = match msg["method"].as_str().unwrap_or_default() {
                    "initialize" => serde_json::json!({
                        "protocolVersion": LATEST_PROTOCOL_VERSION,
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "fake-weather", "version": "0.1.0"}
                    }),
                    "tools/list" => serde_json::json!({"tools": tools}),
                    "tools/call" => match params["name"].as_str().unwrap_or_default() {
                        "slow" => continue,
                        "broken" => serde_json::json!({
                            "content": [{"type": "text", "text": "upstream unavailable"}],
                            "isError": true
                        }),
                        name => serde_json::json!({
                            "content": [{
                                "type": "text",
                                "text": format!("{name}: {}", params["arguments"])
                            }]
                        }),
                    },
                    "ping" => serde_json::json!({}),
                    other => {
                        let reply = serde_json::json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32601, "message": format!("Method not found: {other}")}
                        });
                        if self.inbound_tx.send(reply.to_string()).is_err() {
                            break;
                        }
                        continue;
                    }
                };

                let reply = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
                if self.inbound_tx.send(reply.to_string()).is_err() {
                    break;
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.outbound_tx.send(message).map_err(|e| {
            AgentApiError::McpTransport(format!("FakeTransport outbound channel closed: {e}"))
                .into()
        })
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        receiver_stream(Arc::clone(&self.inbound_rx))
    }

    async fn set_protocol_version(&self, version: &str) {
        *self.negotiated.lock().unwrap() = Some(version.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_and_receive_cross_over() {
        let (transport, mut handle) = FakeTransport::new();

        transport.send("ping".to_string()).await.unwrap();
        assert_eq!(handle.outbound_rx.recv().await.unwrap(), "ping");

        handle.inbound_tx.send("pong".to_string()).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), transport.receive().next())
            .await
            .unwrap();
        assert_eq!(got.as_deref(), Some("pong"));
    }

    #[tokio::test]
    async fn test_send_fails_when_handle_dropped() {
        let (transport, handle) = FakeTransport::new();
        drop(handle);
        assert!(transport.send("x".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_serve_answers_tools_call() {
        let (transport, handle) = FakeTransport::new();
        handle.serve(serde_json::json!([]));

        transport
            .send(
                serde_json::json!({
                    "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "get_current_weather", "arguments": {"city": "Paris"}}
                })
                .to_string(),
            )
            .await
            .unwrap();

        let raw = tokio::time::timeout(Duration::from_secs(2), transport.receive().next())
            .await
            .unwrap()
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(reply["id"], 3);
        assert_eq!(
            reply["result"]["content"][0]["text"],
            r#"get_current_weather: {"city":"Paris"}"#
        );
    }

    #[tokio::test]
    async fn test_set_protocol_version_recorded() {
        let (transport, _handle) = FakeTransport::new();
        assert!(transport.negotiated_version().is_none());
        transport.set_protocol_version("2024-11-05").await;
        assert_eq!(transport.negotiated_version().as_deref(), Some("2024-11-05"));
    }
}
