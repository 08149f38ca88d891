//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

use crate::tools::ToolDescriptor;

// Health
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_ready: bool,
    pub tools_loaded: usize,
}

// Configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub model: String,
    pub endpoint: String,
    pub mcp_server: Option<String>,
    pub tools_count: usize,
}

// Tool listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDescriptor>,
}

// Queries
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// One tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallView {
    pub name: String,
    /// Parsed argument object
    pub args: serde_json::Value,
}

/// One message of the returned trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallView>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub query: String,
    pub messages: Vec<MessageView>,
    pub final_response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleAskResponse {
    pub response: String,
}

// Errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
