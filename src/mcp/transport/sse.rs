//! Legacy HTTP+SSE transport for MCP
//!
//! The client opens a long-lived `GET` on the server's SSE URL. The first
//! event is `endpoint`, whose data is the (usually relative) URL the client
//! must POST its JSON-RPC messages to. Every server-to-client message then
//! arrives as a `message` event on the open stream; POSTs are only
//! acknowledged with `202 Accepted`.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::{AgentApiError, Result};
use crate::mcp::transport::event_stream::read_events;
use crate::mcp::transport::{receiver_stream, Transport};

/// HTTP+SSE transport bound to a single open event stream.
#[derive(Debug)]
pub struct SseTransport {
    http_client: reqwest::Client,
    /// URL announced by the server's `endpoint` event.
    message_endpoint: url::Url,
    headers: HashMap<String, String>,
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream at `url` and wait for the `endpoint` event.
    ///
    /// `timeout` bounds connecting, waiting for the endpoint, and each POST.
    /// The stream itself stays open without a deadline.
    ///
    /// # Errors
    ///
    /// Returns [`AgentApiError::McpTransport`] if the GET fails, returns a
    /// non-success status, or the server never announces a usable endpoint.
    pub async fn connect(
        url: url::Url,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let stream_client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                AgentApiError::McpTransport(format!("failed to build HTTP client: {e}"))
            })?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AgentApiError::McpTransport(format!("failed to build HTTP client: {e}"))
            })?;

        let mut req = stream_client
            .get(url.clone())
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");
        for (k, v) in &headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = tokio::time::timeout(timeout, req.send())
            .await
            .map_err(|_| {
                AgentApiError::McpTransport(format!("timed out opening SSE stream at {url}"))
            })?
            .map_err(|e| AgentApiError::McpTransport(format!("SSE GET failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                AgentApiError::McpTransport(format!("SSE stream returned HTTP {status}")).into(),
            );
        }

        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<std::result::Result<url::Url, String>>();
        let reader = tokio::spawn(read_stream(
            response.bytes_stream(),
            url.clone(),
            endpoint_tx,
            response_tx,
        ));

        let message_endpoint = match tokio::time::timeout(timeout, endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(reason))) => {
                reader.abort();
                return Err(AgentApiError::McpTransport(reason).into());
            }
            Ok(Err(_)) | Err(_) => {
                reader.abort();
                return Err(AgentApiError::McpTransport(format!(
                    "SSE server at {url} did not announce a message endpoint"
                ))
                .into());
            }
        };

        tracing::debug!("MCP SSE message endpoint: {message_endpoint}");

        Ok(Self {
            http_client,
            message_endpoint,
            headers,
            response_rx: Arc::new(Mutex::new(response_rx)),
            reader,
        })
    }

    /// URL that outbound messages are POSTed to.
    pub fn message_endpoint(&self) -> &url::Url {
        &self.message_endpoint
    }
}

/// Drive the event stream until it closes.
///
/// The first `endpoint` event resolves `endpoint_tx`; `message` events are
/// forwarded to `response_tx`.
async fn read_stream(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>>,
    base: url::Url,
    endpoint_tx: oneshot::Sender<std::result::Result<url::Url, String>>,
    response_tx: mpsc::UnboundedSender<String>,
) {
    let mut endpoint_tx = Some(endpoint_tx);

    read_events(byte_stream, |event| {
        if event.is_ping() {
            return true;
        }
        if event.event.as_deref() == Some("endpoint") {
            if let Some(tx) = endpoint_tx.take() {
                let _ = tx.send(resolve_endpoint(&base, event.data.trim()));
            }
            return true;
        }
        if event.is_message() {
            return response_tx.send(event.data).is_ok();
        }
        tracing::debug!("Ignoring SSE event '{:?}'", event.event);
        true
    })
    .await;

    tracing::debug!("MCP SSE stream at {base} closed");
}

/// Resolve the announced endpoint against the stream URL.
///
/// The endpoint must share the stream's origin.
fn resolve_endpoint(base: &url::Url, announced: &str) -> std::result::Result<url::Url, String> {
    let endpoint = base
        .join(announced)
        .map_err(|e| format!("invalid SSE endpoint '{announced}': {e}"))?;
    if endpoint.origin() != base.origin() {
        return Err(format!(
            "SSE endpoint origin {} does not match stream origin {}",
            endpoint.origin().ascii_serialization(),
            base.origin().ascii_serialization()
        ));
    }
    Ok(endpoint)
}

#[async_trait::async_trait]
impl Transport for SseTransport {
    /// POST one JSON-RPC message to the announced endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AgentApiError::McpTransport`] if the POST fails or the
    /// server answers with a non-success status.
    async fn send(&self, message: String) -> Result<()> {
        let mut req = self
            .http_client
            .post(self.message_endpoint.clone())
            .header("Content-Type", "application/json")
            .body(message);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| AgentApiError::McpTransport(format!("HTTP POST failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(
                AgentApiError::McpTransport(format!("HTTP POST returned status {status}")).into(),
            );
        }
        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        receiver_stream(Arc::clone(&self.response_rx))
    }

    /// Drop the event stream; the server ends the session when it closes.
    async fn close(&self) {
        self.reader.abort();
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
