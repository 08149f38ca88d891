//! Shared fixtures for integration tests
//!
//! - a scripted weather MCP server, reachable over Streamable HTTP (wiremock)
//!   or legacy HTTP+SSE (a small axum app, since the event stream must stay
//!   open while requests are POSTed); the SSE server can be restarted or
//!   taken down mid-test
//! - canned chat-completion bodies for the model endpoint
//! - temporary config files

use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;
use wiremock::{Request, Respond, ResponseTemplate};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Tools offered by the scripted weather server
#[allow(dead_code)]
pub fn weather_tools() -> Value {
    json!([
        {
            "name": "get_current_weather",
            "description": "Get the current weather for a city",
            "inputSchema": {
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }
        },
        {
            "name": "get_forecast",
            "description": "Get a multi-day forecast for a city",
            "inputSchema": {
                "type": "object",
                "properties": {"city": {"type": "string"}, "days": {"type": "integer"}}
            }
        }
    ])
}

/// Reply the scripted weather server sends for a JSON-RPC message
///
/// Returns `None` for notifications.
#[allow(dead_code)]
pub fn mcp_reply(message: &Value) -> Option<Value> {
    let id = message.get("id").filter(|id| !id.is_null())?.clone();
    let params = &message["params"];

    let result = match message["method"].as_str().unwrap_or_default() {
        "initialize" => json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": "weather", "version": "1.0.0"}
        }),
        "tools/list" => json!({"tools": weather_tools()}),
        "tools/call" => {
            let city = params["arguments"]["city"].as_str().unwrap_or("nowhere");
            match params["name"].as_str().unwrap_or_default() {
                "get_current_weather" => json!({
                    "content": [{"type": "text", "text": format!("{city}: Sunny, 22C")}]
                }),
                other => json!({
                    "content": [{"type": "text", "text": format!("Unknown tool: {other}")}],
                    "isError": true
                }),
            }
        }
        "ping" => json!({}),
        other => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method not found: {other}")}
            }))
        }
    };

    Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

/// wiremock responder acting as a Streamable HTTP weather server
#[allow(dead_code)]
pub struct StreamableHttpMcp;

impl Respond for StreamableHttpMcp {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(message) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };
        match mcp_reply(&message) {
            Some(reply) => ResponseTemplate::new(200)
                .insert_header("Mcp-Session-Id", "session-1")
                .set_body_raw(reply.to_string(), "application/json"),
            None => ResponseTemplate::new(202),
        }
    }
}

/// Control handle on a running legacy HTTP+SSE weather server
#[derive(Clone, Default)]
pub struct SseMcpControl {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Event>>>>,
    down: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl SseMcpControl {
    /// End the open event stream, as a server restart does
    pub fn drop_stream(&self) {
        *self.sender.lock().unwrap() = None;
    }

    /// End the stream and answer every later request with an error status
    pub fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
        self.drop_stream();
    }
}

async fn sse_stream(
    State(control): State<SseMcpControl>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    if control.down.load(Ordering::SeqCst) {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(
        Event::default()
            .event("endpoint")
            .data("/messages/?session_id=test"),
    );
    *control.sender.lock().unwrap() = Some(tx);
    Ok(Sse::new(UnboundedReceiverStream::new(rx).map(Ok)))
}

async fn post_message(
    State(control): State<SseMcpControl>,
    Json(message): Json<Value>,
) -> StatusCode {
    if let Some(reply) = mcp_reply(&message) {
        let guard = control.sender.lock().unwrap();
        let Some(tx) = guard.as_ref() else {
            return StatusCode::NOT_FOUND;
        };
        let _ = tx.send(Event::default().event("message").data(reply.to_string()));
    }
    StatusCode::ACCEPTED
}

/// Start a legacy HTTP+SSE weather server; returns its `/sse` URL
#[allow(dead_code)]
pub async fn spawn_sse_mcp_server() -> String {
    spawn_controlled_sse_mcp_server().await.0
}

/// Start a legacy HTTP+SSE weather server that tests can restart or stop
#[allow(dead_code)]
pub async fn spawn_controlled_sse_mcp_server() -> (String, SseMcpControl) {
    let control = SseMcpControl::default();
    let app = Router::new()
        .route("/sse", get(sse_stream))
        .route("/messages/", post(post_message))
        .with_state(control.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/sse"), control)
}

/// A chat completion whose message is a plain answer
#[allow(dead_code)]
pub fn answer_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 42, "completion_tokens": 8, "total_tokens": 50}
    })
}

/// A chat completion requesting one tool call
#[allow(dead_code)]
pub fn tool_call_completion(name: &str, arguments: Value) -> Value {
    json!({
        "id": "chatcmpl-2",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments.to_string()}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

/// wiremock responder for the model: asks for `get_current_weather` until a
/// tool result is in the conversation, then answers
#[allow(dead_code)]
pub struct WeatherModel {
    pub answer: String,
}

impl Respond for WeatherModel {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        let has_tool_result = messages.iter().any(|m| m["role"] == "tool");

        if has_tool_result {
            ResponseTemplate::new(200).set_body_json(answer_completion(&self.answer))
        } else {
            ResponseTemplate::new(200).set_body_json(tool_call_completion(
                "get_current_weather",
                json!({"city": "Paris"}),
            ))
        }
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
