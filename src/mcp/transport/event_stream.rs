//! Server-Sent Events parsing shared by both HTTP transports
//!
//! [`SseParser`] is an incremental line parser: feed it raw body chunks and
//! it returns every event completed by that chunk. Chunks may split lines,
//! multi-byte characters, or `\r\n` pairs anywhere.
//!
//! Buffered input is bounded by [`MAX_EVENT_BYTES`]. A peer that streams
//! past the bound without finishing a line or an event gets its stream
//! closed.

use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Upper bound on an unfinished line or the `data:` of one event.
pub const MAX_EVENT_BYTES: usize = 4 * 1024 * 1024;

/// The peer sent more than the parser's limit without a line or event break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("SSE event exceeds {limit} bytes")]
pub struct EventTooLarge {
    pub limit: usize,
}

/// One dispatched SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
    /// Value of the `id:` field, if any.
    pub id: Option<String>,
}

impl SseEvent {
    /// True for keep-alive events that carry no JSON-RPC payload.
    pub fn is_ping(&self) -> bool {
        self.event
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("ping"))
            || self.data.eq_ignore_ascii_case("[ping]")
    }

    /// True when the event should be treated as a JSON-RPC message
    /// (`event: message` or no event name).
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

/// Incremental SSE parser.
///
/// # Examples
///
/// ```
/// use mcp_agent_api::mcp::transport::event_stream::SseParser;
///
/// let mut parser = SseParser::default();
/// assert!(parser.push(b"event: endpoint\r\nda")?.is_empty());
/// let events = parser.push(b"ta: /messages?session_id=1\r\n\r\n")?;
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event.as_deref(), Some("endpoint"));
/// assert_eq!(events[0].data, "/messages?session_id=1");
/// # Ok::<(), mcp_agent_api::mcp::transport::event_stream::EventTooLarge>(())
/// ```
#[derive(Debug)]
pub struct SseParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
    id: Option<String>,
    limit: usize,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseParser {
    /// Parser that rejects lines or events larger than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            event: None,
            data: Vec::new(),
            data_len: 0,
            id: None,
            limit,
        }
    }

    /// Feed a chunk, returning the events it completes.
    ///
    /// Once this returns [`EventTooLarge`] the parser state is unspecified
    /// and the stream should be dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, EventTooLarge> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
            if self.data_len > self.limit {
                return Err(EventTooLarge { limit: self.limit });
            }
        }

        if self.pending.len() > self.limit {
            return Err(EventTooLarge { limit: self.limit });
        }
        Ok(events)
    }

    /// Flush an event left open when the stream ended without a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&rest).into_owned();
            let line = line.trim_end_matches('\r');
            if let Some(event) = self.process_line(line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                self.data_len += value.len();
                self.data.push(value.to_string());
            }
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        self.data_len = 0;
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent { event, data, id })
    }
}

/// Consume an HTTP body as SSE, handing each event to `on_event`.
///
/// Returns when the body ends, errors, overruns [`MAX_EVENT_BYTES`], or
/// `on_event` returns `false`.
pub async fn read_events<S, F>(byte_stream: S, on_event: F)
where
    S: Stream<Item = reqwest::Result<Bytes>>,
    F: FnMut(SseEvent) -> bool,
{
    read_events_with(SseParser::default(), byte_stream, on_event).await
}

async fn read_events_with<S, F>(mut parser: SseParser, byte_stream: S, mut on_event: F)
where
    S: Stream<Item = reqwest::Result<Bytes>>,
    F: FnMut(SseEvent) -> bool,
{
    tokio::pin!(byte_stream);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!("SSE stream error: {e}");
                return;
            }
        };
        let events = match parser.push(&chunk) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Closing SSE stream: {e}");
                return;
            }
        };
        for event in events {
            if !on_event(event) {
                return;
            }
        }
    }

    if let Some(event) = parser.finish() {
        on_event(event);
    }
}
