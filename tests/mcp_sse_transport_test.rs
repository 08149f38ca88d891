//! Legacy HTTP+SSE transport integration tests
//!
//! The happy paths run against the axum weather server in `common`, which
//! keeps the event stream open. Failure paths use `wiremock`, whose bodies
//! end immediately.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_agent_api::mcp::config::McpServerConfig;
use mcp_agent_api::mcp::transport::sse::SseTransport;
use mcp_agent_api::mcp::transport::Transport;
use mcp_agent_api::mcp::{McpClientManager, McpServerConnection};
use mcp_agent_api::tools::ToolExecutor;

async fn connect(url: &str) -> mcp_agent_api::Result<SseTransport> {
    SseTransport::connect(
        url::Url::parse(url).unwrap(),
        HashMap::new(),
        Duration::from_secs(2),
    )
    .await
}

#[tokio::test]
async fn test_connect_resolves_announced_endpoint() {
    let url = common::spawn_sse_mcp_server().await;
    let transport = connect(&url).await.expect("connect");

    let endpoint = transport.message_endpoint();
    assert_eq!(endpoint.path(), "/messages/");
    assert_eq!(endpoint.query(), Some("session_id=test"));
    assert_eq!(endpoint.host_str(), Some("127.0.0.1"));
}

#[tokio::test]
async fn test_replies_arrive_on_the_event_stream() {
    let url = common::spawn_sse_mcp_server().await;
    let transport = connect(&url).await.expect("connect");

    transport
        .send(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#.to_string())
        .await
        .expect("POST accepted");

    let mut stream = transport.receive();
    let reply = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("reply within deadline")
        .expect("stream open");
    let reply: serde_json::Value = serde_json::from_str(&reply).unwrap();
    assert_eq!(reply["id"], 7);
    assert_eq!(reply["result"], serde_json::json!({}));
}

#[tokio::test]
async fn test_stream_without_endpoint_event_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "event: message\ndata: {}\n\n".as_bytes().to_vec(),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let err = connect(&format!("{}/sse", server.uri()))
        .await
        .expect_err("no endpoint announced");
    assert!(
        err.to_string().contains("did not announce a message endpoint"),
        "{err}"
    );
}

#[tokio::test]
async fn test_stream_error_status_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = connect(&format!("{}/sse", server.uri()))
        .await
        .expect_err("503 must fail");
    assert!(err.to_string().contains("SSE stream returned HTTP 503"), "{err}");
}

#[tokio::test]
async fn test_cross_origin_endpoint_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "event: endpoint\ndata: http://elsewhere.invalid/messages\n\n"
                .as_bytes()
                .to_vec(),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    assert!(connect(&format!("{}/sse", server.uri())).await.is_err());
}

#[tokio::test]
async fn test_unreachable_server_fails() {
    // Port 9 (discard) is closed on test hosts.
    assert!(connect("http://127.0.0.1:9/sse").await.is_err());
}

#[tokio::test]
async fn test_connection_handshake_over_sse() {
    let url = common::spawn_sse_mcp_server().await;
    let transport: Arc<dyn Transport> = Arc::new(connect(&url).await.expect("connect"));

    let connection = McpServerConnection::establish(
        "weather",
        transport,
        Duration::from_secs(5),
        CancellationToken::new(),
    )
    .await
    .expect("handshake");
    assert_eq!(connection.protocol_version(), common::PROTOCOL_VERSION);

    let tools = connection.list_tools().await.expect("tools/list");
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "get_current_weather");
    connection.close().await;
    assert!(connection.is_closed());
}

#[tokio::test]
async fn test_manager_loads_tools_from_sse_server() {
    let url = common::spawn_sse_mcp_server().await;
    let manager = McpClientManager::connect(&[McpServerConfig::new("weather", url)])
        .await
        .expect("connect");

    let registry = manager.load_tools().await.expect("load tools");
    let names: Vec<String> = registry.descriptors().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["get_current_weather", "get_forecast"]);

    let result = registry
        .get("get_current_weather")
        .expect("registered")
        .execute(serde_json::json!({"city": "Oslo"}))
        .await
        .expect("tools/call");
    assert_eq!(result.output, "Oslo: Sunny, 22C");

    manager.shutdown().await;
}

fn weather_server(url: String) -> McpServerConfig {
    McpServerConfig {
        timeout_seconds: 5,
        ..McpServerConfig::new("weather", url)
    }
}

#[tokio::test]
async fn test_tool_calls_recover_after_server_restart() {
    let (url, control) = common::spawn_controlled_sse_mcp_server().await;
    let manager = McpClientManager::connect(&[weather_server(url)])
        .await
        .expect("connect");
    let registry = manager.load_tools().await.expect("load tools");
    let weather = registry.get("get_current_weather").expect("registered");
    let args = serde_json::json!({"city": "Oslo"});

    let before = weather.execute(args.clone()).await.expect("first call");
    assert_eq!(before.output, "Oslo: Sunny, 22C");

    control.drop_stream();

    // Depending on whether the client saw the stream end first, this call
    // reconnects or fails fast with the transport's own error.
    let started = Instant::now();
    match weather.execute(args.clone()).await {
        Ok(result) => assert_eq!(result.output, "Oslo: Sunny, 22C"),
        Err(e) => assert!(e.to_string().starts_with("MCP transport error"), "{e}"),
    }
    assert!(started.elapsed() < Duration::from_secs(3));

    let after = weather.execute(args).await.expect("call on reopened session");
    assert_eq!(after.output, "Oslo: Sunny, 22C");

    manager.shutdown().await;
}

#[tokio::test]
async fn test_tool_call_against_stopped_server_fails_fast() {
    let (url, control) = common::spawn_controlled_sse_mcp_server().await;
    let manager = McpClientManager::connect(&[weather_server(url)])
        .await
        .expect("connect");
    let registry = manager.load_tools().await.expect("load tools");
    let weather = registry.get("get_current_weather").expect("registered");

    control.go_down();

    for _ in 0..2 {
        let started = Instant::now();
        let err = weather
            .execute(serde_json::json!({"city": "Oslo"}))
            .await
            .expect_err("server is down");
        let text = err.to_string();
        assert!(text.starts_with("MCP transport error"), "{text}");
        assert!(!text.contains("MCP timeout"), "{text}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}

#[tokio::test]
async fn test_manager_names_the_failing_server() {
    let err = McpClientManager::connect(&[McpServerConfig::new(
        "weather",
        "http://127.0.0.1:9/sse",
    )])
    .await
    .expect_err("unreachable");
    assert!(
        format!("{err:#}").contains("Failed to connect to MCP server 'weather'"),
        "{err:#}"
    );
}
