//! Reshaping of agent traces into API messages
//!
//! Every trace message is classified into a [`TraceEntry`] first, so each
//! role is handled in exactly one place.

use crate::api::types::{MessageView, ToolCallView};
use crate::providers::{Message, Role, ToolCall};

/// A trace message, classified by role
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEntry {
    /// The seed query
    User { content: String },
    /// A model turn; `tool_calls` is empty for an answer
    Assistant {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    /// Output of one tool call
    Tool { content: String },
}

impl TraceEntry {
    /// Classify a message; system messages have no entry
    pub fn from_message(message: &Message) -> Option<Self> {
        let content = message.content.clone().unwrap_or_default();
        match message.role {
            Role::System => None,
            Role::User => Some(Self::User { content }),
            Role::Assistant => Some(Self::Assistant {
                content,
                tool_calls: message.tool_calls.clone().unwrap_or_default(),
            }),
            Role::Tool => Some(Self::Tool { content }),
        }
    }

    /// True for an assistant turn that requests no tools
    pub fn is_answer(&self) -> bool {
        matches!(self, Self::Assistant { tool_calls, .. } if tool_calls.is_empty())
    }

    fn into_view(self) -> MessageView {
        match self {
            Self::User { content } => MessageView {
                role: Role::User.to_string(),
                content,
                tool_calls: None,
            },
            Self::Assistant {
                content,
                tool_calls,
            } => MessageView {
                role: Role::Assistant.to_string(),
                content,
                tool_calls: (!tool_calls.is_empty())
                    .then(|| tool_calls.iter().map(tool_call_view).collect()),
            },
            Self::Tool { content } => MessageView {
                role: Role::Tool.to_string(),
                content,
                tool_calls: None,
            },
        }
    }
}

/// Parse tool arguments, falling back to an empty object
fn tool_call_view(call: &ToolCall) -> ToolCallView {
    let args = serde_json::from_str(&call.function.arguments)
        .unwrap_or_else(|_| serde_json::json!({}));
    ToolCallView {
        name: call.function.name.clone(),
        args,
    }
}

/// Convert a trace into API messages and pick the final response
///
/// The final response is the content of the last assistant message without
/// tool calls, or the empty string when there is none.
pub fn reshape(trace: &[Message]) -> (Vec<MessageView>, String) {
    let mut final_response = String::new();
    let messages = trace
        .iter()
        .filter_map(TraceEntry::from_message)
        .map(|entry| {
            if let TraceEntry::Assistant { content, .. } = &entry {
                if entry.is_answer() {
                    final_response = content.clone();
                }
            }
            entry.into_view()
        })
        .collect();
    (messages, final_response)
}

/// Answer for `/ask/simple`
///
/// Scans from the end for an assistant message with non-empty content and
/// no tool calls.
pub fn simple_response(trace: &[Message]) -> String {
    trace
        .iter()
        .rev()
        .filter_map(TraceEntry::from_message)
        .find_map(|entry| match entry {
            TraceEntry::Assistant {
                content,
                tool_calls,
            } if tool_calls.is_empty() && !content.is_empty() => Some(content),
            _ => None,
        })
        .unwrap_or_default()
}
