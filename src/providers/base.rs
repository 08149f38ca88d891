//! Base provider trait and common chat types for mcp-agent-api
//!
//! This module defines the Provider trait that chat model backends implement,
//! along with the message and response structures the agent loop exchanges
//! with them.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that steer the model
    System,
    /// End-user input
    User,
    /// Model output, possibly carrying tool calls
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message structure for conversation
///
/// Represents a message in the conversation with the chat model.
/// Messages can be from the user, assistant, system, or tool results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Optional tool calls in the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Optional tool call ID (for tool result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::providers::{Message, Role};
    ///
    /// let msg = Message::user("What's the weather in Paris?");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::providers::{Message, Role};
    ///
    /// let msg = Message::assistant("It is sunny.");
    /// assert_eq!(msg.role, Role::Assistant);
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new tool result message
    ///
    /// # Arguments
    ///
    /// * `tool_call_id` - The ID of the tool call this result corresponds to
    /// * `content` - The tool execution result content
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::providers::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "22C and clear");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Creates an assistant message with tool calls
    ///
    /// Any text the model produced alongside the calls is kept in `content`.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// True when the message carries at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|calls| !calls.is_empty())
            .unwrap_or(false)
    }
}

/// Function call information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function to call
    pub name: String,
    /// Arguments as a JSON-encoded string
    pub arguments: String,
}

/// Tool call requested by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier
    pub id: String,
    /// Function to invoke
    pub function: FunctionCall,
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: usize,
    /// Tokens in the completion
    pub completion_tokens: usize,
    /// Sum of both
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a usage record; the total is computed
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Completion response with message and optional token usage
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The response message from the model
    pub message: Message,
    /// Optional token usage information
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a new CompletionResponse
    pub fn new(message: Message) -> Self {
        Self {
            message,
            usage: None,
        }
    }

    /// Create a new CompletionResponse with token usage
    pub fn with_usage(message: Message, usage: TokenUsage) -> Self {
        Self {
            message,
            usage: Some(usage),
        }
    }
}

/// Provider trait for chat model backends
///
/// # Examples
///
/// ```no_run
/// use mcp_agent_api::providers::{Provider, Message, CompletionResponse};
/// use mcp_agent_api::error::Result;
/// use async_trait::async_trait;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl Provider for MyProvider {
///     async fn complete(
///         &self,
///         messages: &[Message],
///         tools: &[serde_json::Value],
///     ) -> Result<CompletionResponse> {
///         Ok(CompletionResponse::new(Message::assistant("Response")))
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Completes a conversation with the given messages and available tools
    ///
    /// # Arguments
    ///
    /// * `messages` - Conversation history
    /// * `tools` - Tool definitions as `{name, description, parameters}` objects
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails or the response is invalid
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse>;

    /// Model identifier the provider sends
    fn model(&self) -> &str {
        "unknown"
    }
}

/// Drop tool messages that do not answer a preceding assistant tool call
///
/// Chat completion APIs reject orphaned tool results, so they are removed
/// before a request is built.
///
/// # Examples
///
/// ```
/// use mcp_agent_api::providers::{Message, validate_message_sequence};
///
/// let messages = vec![
///     Message::user("Weather?"),
///     Message::tool_result("call_123", "Result"),
/// ];
/// let validated = validate_message_sequence(&messages);
/// assert_eq!(validated.len(), 1);
/// ```
pub fn validate_message_sequence(messages: &[Message]) -> Vec<Message> {
    use std::collections::HashSet;

    let valid_tool_ids: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .map(|tc| tc.id.as_str())
        .collect();

    messages
        .iter()
        .filter(|message| {
            if message.role != Role::Tool {
                return true;
            }
            match &message.tool_call_id {
                Some(id) if valid_tool_ids.contains(id.as_str()) => true,
                Some(id) => {
                    tracing::warn!("Dropping orphan tool message with tool_call_id: {}", id);
                    false
                }
                None => {
                    tracing::warn!("Dropping tool message without tool_call_id");
                    false
                }
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: "get_weather".to_string(),
                arguments: r#"{"city":"Paris"}"#.to_string(),
            },
        }
    }

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, Some("Hello".to_string()));
        assert!(msg.tool_calls.is_none());
        assert!(msg.tool_call_id.is_none());
    }

    #[test]
    fn test_message_assistant_with_tools_keeps_content() {
        let msg = Message::assistant_with_tools(Some("checking".to_string()), vec![call("c1")]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.as_deref(), Some("checking"));
        assert!(msg.has_tool_calls());
    }

    #[test]
    fn test_has_tool_calls_false_for_empty_vec() {
        let msg = Message::assistant_with_tools(None, vec![]);
        assert!(!msg.has_tool_calls());
        assert!(!Message::assistant("done").has_tool_calls());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(Message::tool_result("c1", "ok")).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "c1");
        assert!(json.get("tool_calls").is_none());
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_completion_response_with_usage() {
        let response = CompletionResponse::with_usage(Message::assistant("hi"), TokenUsage::new(1, 2));
        assert_eq!(response.usage.unwrap().total_tokens, 3);
        assert!(CompletionResponse::new(Message::assistant("hi")).usage.is_none());
    }

    #[test]
    fn test_validate_message_sequence_keeps_answered_tool_results() {
        let messages = vec![
            Message::user("Weather?"),
            Message::assistant_with_tools(None, vec![call("c1")]),
            Message::tool_result("c1", "sunny"),
            Message::tool_result("c2", "orphan"),
        ];
        let validated = validate_message_sequence(&messages);
        assert_eq!(validated.len(), 3);
        assert_eq!(validated[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_validate_message_sequence_drops_tool_without_id() {
        let mut orphan = Message::tool_result("x", "data");
        orphan.tool_call_id = None;
        let validated = validate_message_sequence(&[Message::user("hi"), orphan]);
        assert_eq!(validated.len(), 1);
    }
}
