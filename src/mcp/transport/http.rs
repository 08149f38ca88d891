//! Streamable HTTP transport for MCP
//!
//! Every outbound JSON-RPC message is an HTTP POST. The server may answer
//! with:
//!
//! - `application/json`: a direct JSON-RPC message in the body
//! - `text/event-stream`: an SSE stream carrying one or more messages
//! - `202 Accepted`: an acknowledgement with no body (notifications)
//!
//! # Session management
//!
//! The server MAY return an `Mcp-Session-Id` header on the `initialize`
//! response. It is stored and attached to every later POST. A `404` while a
//! session is active clears the session and fails with
//! `AgentApiError::Mcp("mcp session expired")`. [`Transport::close`] ends the
//! session with a `DELETE` and waits for it; a transport dropped without
//! being closed still fires a best-effort `DELETE` in the background.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::error::{AgentApiError, Result};
use crate::mcp::transport::event_stream::read_events;
use crate::mcp::transport::{receiver_stream, Transport};
use crate::mcp::types::LATEST_PROTOCOL_VERSION;

const SESSION_HEADER: &str = "Mcp-Session-Id";
/// Message of the [`AgentApiError::Mcp`] returned when the server forgot the session.
pub const SESSION_EXPIRED: &str = "mcp session expired";
const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Streamable HTTP transport.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::time::Duration;
/// use url::Url;
/// use mcp_agent_api::mcp::transport::http::HttpTransport;
///
/// let transport = HttpTransport::new(
///     Url::parse("http://localhost:8000/mcp").unwrap(),
///     HashMap::new(),
///     Duration::from_secs(30),
/// )
/// .unwrap();
/// ```
#[derive(Debug)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    /// MCP endpoint URL (POST target).
    endpoint: url::Url,
    /// Active session ID, populated after `initialize` succeeds.
    session_id: Arc<RwLock<Option<String>>>,
    /// Revision sent in `MCP-Protocol-Version`; updated after negotiation.
    protocol_version: RwLock<String>,
    /// Extra headers merged into every request (e.g. Authorization).
    headers: HashMap<String, String>,
    response_tx: mpsc::UnboundedSender<String>,
    response_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl HttpTransport {
    /// Build a transport targeting `endpoint`. No network I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`AgentApiError::McpTransport`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        endpoint: url::Url,
        headers: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AgentApiError::McpTransport(format!("failed to build HTTP client: {e}"))
            })?;

        let (response_tx, response_rx) = mpsc::unbounded_channel();

        Ok(Self {
            http_client,
            endpoint,
            session_id: Arc::new(RwLock::new(None)),
            protocol_version: RwLock::new(LATEST_PROTOCOL_VERSION.to_string()),
            headers,
            response_tx,
            response_rx: Arc::new(Mutex::new(response_rx)),
        })
    }

    /// Current session ID, if the server assigned one.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    fn delete_request(&self, session_id: String) -> reqwest::RequestBuilder {
        let mut req = self
            .http_client
            .delete(self.endpoint.clone())
            .header(SESSION_HEADER, session_id);
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    /// POST one JSON-RPC message and route whatever comes back to
    /// [`Transport::receive`].
    ///
    /// # Errors
    ///
    /// - [`AgentApiError::McpAuth`] on `401`, carrying `WWW-Authenticate`
    /// - [`AgentApiError::Mcp`] on `404` with an active session
    /// - [`AgentApiError::McpTransport`] on any other failure
    async fn send(&self, message: String) -> Result<()> {
        let mut req = self
            .http_client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(
                PROTOCOL_VERSION_HEADER,
                self.protocol_version.read().await.as_str(),
            )
            .body(message);

        if let Some(id) = self.session_id.read().await.as_deref() {
            req = req.header(SESSION_HEADER, id);
        }
        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .send()
            .await
            .map_err(|e| AgentApiError::McpTransport(format!("HTTP POST failed: {e}")))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            let www_auth = response
                .headers()
                .get("WWW-Authenticate")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(AgentApiError::McpAuth(www_auth).into());
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            let mut sid = self.session_id.write().await;
            if sid.take().is_some() {
                return Err(AgentApiError::Mcp(SESSION_EXPIRED.into()).into());
            }
            return Err(AgentApiError::McpTransport("HTTP 404 Not Found".into()).into());
        }

        if status == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        if !status.is_success() {
            return Err(
                AgentApiError::McpTransport(format!("HTTP POST returned status {status}")).into(),
            );
        }

        if let Some(new_session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut sid = self.session_id.write().await;
            if sid.is_none() {
                *sid = Some(new_session_id.to_string());
            }
        }

        let content_type = response
            .headers()
            .get("Content-Type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if content_type.contains("text/event-stream") {
            let response_tx = self.response_tx.clone();
            let byte_stream = response.bytes_stream();
            tokio::spawn(async move {
                read_events(byte_stream, |event| {
                    if event.is_ping() || !event.is_message() {
                        return true;
                    }
                    response_tx.send(event.data).is_ok()
                })
                .await;
            });
        } else {
            let body = response.text().await.map_err(|e| {
                AgentApiError::McpTransport(format!("failed to read response body: {e}"))
            })?;
            if !body.trim().is_empty() {
                let _ = self.response_tx.send(body);
            }
        }

        Ok(())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        receiver_stream(Arc::clone(&self.response_rx))
    }

    async fn set_protocol_version(&self, version: &str) {
        *self.protocol_version.write().await = version.to_string();
    }

    /// Send `DELETE` with the session ID and wait for the answer.
    ///
    /// Servers may refuse with `405`; that and any other failure is only
    /// logged. Later calls find no session and return at once.
    async fn close(&self) {
        let Some(sid) = self.session_id.write().await.take() else {
            return;
        };
        match self.delete_request(sid).send().await {
            Ok(response) => tracing::debug!("MCP session DELETE returned {}", response.status()),
            Err(e) => tracing::debug!("MCP session DELETE failed: {e}"),
        }
    }
}

impl Drop for HttpTransport {
    /// End a session that was never closed with a best-effort `DELETE`.
    fn drop(&mut self) {
        let Ok(guard) = self.session_id.try_read() else {
            return;
        };
        let Some(sid) = guard.clone() else {
            return;
        };
        drop(guard);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let req = self.delete_request(sid);
        runtime.spawn(async move {
            if let Err(e) = req.send().await {
                tracing::debug!("MCP session DELETE failed: {e}");
            }
        });
    }
}
