//! Provider module for mcp-agent-api
//!
//! This module contains the chat model abstraction and the OpenAI-compatible
//! implementation used to reach Llama Stack.

pub mod base;
pub mod openai;

pub use base::{
    validate_message_sequence, CompletionResponse, FunctionCall, Message, Provider, Role,
    TokenUsage, ToolCall,
};
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Create the configured provider
///
/// # Errors
///
/// Returns error if the endpoint or model is missing or the HTTP client
/// cannot be built
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    Ok(Box::new(OpenAiProvider::new(config)?))
}
