//! MCP transport abstraction and implementations
//!
//! - [`sse::SseTransport`] speaks the legacy HTTP+SSE transport: a long-lived
//!   GET event stream plus POSTs to the endpoint the server announces.
//! - [`http::HttpTransport`] speaks Streamable HTTP: every message is a POST
//!   and replies come back as JSON or as an SSE stream.
//! - [`fake::FakeTransport`] is an in-process fake used in tests.
//!
//! Callers `send` a serialized JSON-RPC string and `receive` a stream of
//! serialized JSON-RPC strings. Framing and session handling belong to each
//! implementation.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;

pub mod event_stream;
pub mod http;
pub mod sse;

#[cfg(test)]
pub mod fake;

/// Abstraction over MCP transport implementations.
///
/// Used polymorphically through `Arc<dyn Transport>` by the connection
/// manager.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a complete JSON-RPC message string to the remote peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::AgentApiError::McpTransport`] if the
    /// underlying I/O fails.
    async fn send(&self, message: String) -> Result<()>;

    /// Stream of inbound JSON-RPC message strings, one per logical message.
    ///
    /// The stream ends when the transport is closed.
    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>>;

    /// Record the protocol revision negotiated during `initialize`.
    ///
    /// Transports that put the revision on the wire override this.
    async fn set_protocol_version(&self, _version: &str) {}

    /// End the session with the remote peer.
    ///
    /// Returns once any goodbye message has been sent. Must be safe to call
    /// more than once.
    async fn close(&self) {}
}

/// Turn a shared receiver into the stream returned by [`Transport::receive`].
pub(crate) fn receiver_stream(
    rx: std::sync::Arc<tokio::sync::Mutex<tokio::sync::mpsc::UnboundedReceiver<String>>>,
) -> Pin<Box<dyn Stream<Item = String> + Send + 'static>> {
    Box::pin(futures::stream::unfold(rx, |rx| async move {
        let mut guard = rx.lock().await;
        let item = guard.recv().await?;
        drop(guard);
        Some((item, rx))
    }))
}
