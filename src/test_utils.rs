//! Test utilities for mcp-agent-api
//!
//! Scripted providers and tools shared by the unit tests of the agent and
//! the HTTP handlers.

use crate::config::Config;
use crate::error::{AgentApiError, Result};
use crate::mcp::config::McpServerConfig;
use crate::providers::{CompletionResponse, FunctionCall, Message, Provider, ToolCall};
use crate::tools::{ToolExecutor, ToolResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider that replays a fixed list of assistant messages
///
/// Once the script is exhausted it answers "Done". Every call records the
/// messages it was given.
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Vec<Message>,
    delay: Option<Duration>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    /// Provider whose every call fails with a provider error
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Sleep before each answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Messages passed to the nth call
    pub fn request(&self, n: usize) -> Vec<Message> {
        self.calls.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(messages.to_vec());
            calls.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = &self.failure {
            return Err(AgentApiError::Provider(failure.clone()).into());
        }

        Ok(CompletionResponse::new(
            self.responses
                .get(index)
                .cloned()
                .unwrap_or_else(|| Message::assistant("Done")),
        ))
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// How a [`StaticTool`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolOutcome {
    Success,
    /// The tool ran and reported an error result
    Failure,
    /// The tool could not be reached
    Unreachable,
}

/// Tool that always returns the same output
pub struct StaticTool {
    pub name: String,
    pub description: String,
    pub output: String,
    pub outcome: ToolOutcome,
}

impl StaticTool {
    pub fn new(name: &str, description: &str, output: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            description: description.to_string(),
            output: output.to_string(),
            outcome: ToolOutcome::Success,
        })
    }

    /// Tool that reports an error result
    pub fn failing(name: &str, error: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            description: String::new(),
            output: error.to_string(),
            outcome: ToolOutcome::Failure,
        })
    }

    /// Tool whose server cannot be reached
    pub fn unreachable(name: &str, error: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            description: String::new(),
            output: error.to_string(),
            outcome: ToolOutcome::Unreachable,
        })
    }
}

#[async_trait]
impl ToolExecutor for StaticTool {
    fn tool_definition(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": {"city": {"type": "string"}}
            }
        })
    }

    async fn execute(&self, _args: serde_json::Value) -> Result<ToolResult> {
        match self.outcome {
            ToolOutcome::Success => Ok(ToolResult::success(self.output.clone())),
            ToolOutcome::Failure => Ok(ToolResult::error(self.output.clone())),
            ToolOutcome::Unreachable => {
                Err(AgentApiError::McpTransport(self.output.clone()).into())
            }
        }
    }
}

/// Assistant message requesting a single tool call
pub fn tool_call_message(id: &str, name: &str, arguments: &str) -> Message {
    Message::assistant_with_tools(
        None,
        vec![ToolCall {
            id: id.to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
    )
}

/// Assert that an error's display text contains the expected message
pub fn assert_error_contains<T: std::fmt::Debug>(result: Result<T>, expected: &str) {
    match result {
        Ok(value) => panic!("Expected error containing '{}', got Ok({:?})", expected, value),
        Err(e) => assert!(
            e.to_string().contains(expected),
            "Expected error containing '{}', got '{}'",
            expected,
            e
        ),
    }
}

/// Valid configuration pointing at unreachable local endpoints
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.endpoint = Some("http://127.0.0.1:9/v1/openai/v1".to_string());
    config.provider.model = Some("llama3.2:3b".to_string());
    config
        .mcp
        .servers
        .push(McpServerConfig::new("weather", "http://127.0.0.1:9/sse"));
    config
}
