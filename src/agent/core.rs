//! Agent core implementation with the tool-calling loop
//!
//! This module implements the agent execution loop that:
//! - Sends the conversation to the chat model
//! - Executes tool calls the model requests
//! - Enforces the turn limit and the invocation deadline
//! - Returns the full trace of the run

use crate::config::AgentConfig;
use crate::error::{AgentApiError, Result};
use crate::prompts;
use crate::providers::{Message, Provider, ToolCall};
use crate::tools::{ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Characters of each tool result that are logged
const LOGGED_RESULT_CHARS: usize = 100;

/// The tool-calling agent behind the query endpoints
///
/// The agent is immutable once built and can serve concurrent invocations;
/// each call to [`Agent::execute`] owns its own message list.
///
/// # Examples
///
/// ```no_run
/// use mcp_agent_api::agent::Agent;
/// use mcp_agent_api::config::{AgentConfig, ProviderConfig};
/// use mcp_agent_api::providers::OpenAiProvider;
/// use mcp_agent_api::tools::ToolRegistry;
///
/// # async fn example() -> mcp_agent_api::error::Result<()> {
/// let provider = OpenAiProvider::new(&ProviderConfig {
///     endpoint: Some("http://localhost:8321/v1/openai/v1".to_string()),
///     model: Some("llama3.2:3b".to_string()),
///     ..ProviderConfig::default()
/// })?;
/// let agent = Agent::new(provider, ToolRegistry::new(), AgentConfig::default())?;
/// let trace = agent.execute("What's the weather in Paris?").await?;
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    config: AgentConfig,
    system_prompt: String,
}

impl Agent {
    /// Creates a new agent instance
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Config` if `max_turns` or `timeout_seconds` is zero
    pub fn new(
        provider: impl Provider + 'static,
        tools: ToolRegistry,
        config: AgentConfig,
    ) -> Result<Self> {
        Self::from_arc(Arc::new(provider), tools, config)
    }

    /// Creates a new agent instance with a boxed provider
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Config` if `max_turns` or `timeout_seconds` is zero
    pub fn new_boxed(
        provider: Box<dyn Provider>,
        tools: ToolRegistry,
        config: AgentConfig,
    ) -> Result<Self> {
        Self::from_arc(Arc::from(provider), tools, config)
    }

    fn from_arc(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        config: AgentConfig,
    ) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(
                AgentApiError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }
        if config.timeout_seconds == 0 {
            return Err(
                AgentApiError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        let system_prompt = prompts::build_system_prompt(config.system_prompt.as_deref());

        Ok(Self {
            provider,
            tools,
            config,
            system_prompt,
        })
    }

    /// Runs the agent on a query and returns the trace
    ///
    /// The trace starts with the query as a user message, followed by every
    /// assistant message (tool-calling ones included) and tool result, and
    /// ends with the assistant message that carried no tool calls. The
    /// system prompt is sent to the model but not included.
    ///
    /// # Errors
    ///
    /// - `AgentApiError::Timeout` if the run exceeds `timeout_seconds`
    /// - `AgentApiError::MaxIterationsExceeded` if the model is still calling
    ///   tools after `max_turns` completions
    /// - any provider or MCP transport error
    ///
    /// A call to an unknown tool, or with arguments that are not JSON, is
    /// answered with an error tool message and the run continues.
    pub async fn execute(&self, user_prompt: impl Into<String>) -> Result<Vec<Message>> {
        let seconds = self.config.timeout_seconds;
        match tokio::time::timeout(Duration::from_secs(seconds), self.run(user_prompt.into()))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Agent execution timeout after {} seconds", seconds);
                Err(AgentApiError::Timeout { seconds }.into())
            }
        }
    }

    async fn run(&self, user_prompt: String) -> Result<Vec<Message>> {
        let start_time = Instant::now();
        info!("Starting agent execution");

        let mut messages = vec![Message::system(&self.system_prompt), Message::user(user_prompt)];
        let tool_definitions = self.tools.all_definitions();
        let mut iteration = 0;

        loop {
            iteration += 1;

            if iteration > self.config.max_turns {
                warn!("Maximum iterations ({}) exceeded", self.config.max_turns);
                return Err(AgentApiError::MaxIterationsExceeded {
                    limit: self.config.max_turns,
                    message: format!(
                        "Agent exceeded maximum iteration limit of {}",
                        self.config.max_turns
                    ),
                }
                .into());
            }

            debug!("Iteration {}/{}", iteration, self.config.max_turns);

            let completion = self
                .provider
                .complete(&messages, &tool_definitions)
                .await?;
            if let Some(usage) = &completion.usage {
                debug!(
                    "Token usage: prompt={}, completion={}, total={}",
                    usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                );
            }
            let message = completion.message;
            debug!("Provider response: {:?}", message);

            let tool_calls = match &message.tool_calls {
                Some(calls) if !calls.is_empty() => calls.clone(),
                _ => {
                    if message.content.as_deref().unwrap_or_default().is_empty() {
                        warn!("Provider returned an empty final answer");
                    }
                    messages.push(message);
                    break;
                }
            };

            info!("Tool calls: {}", describe_calls(&tool_calls));
            messages.push(message);

            for tool_call in &tool_calls {
                let result = self.execute_tool_call(tool_call).await?;
                let content = result.to_message();
                info!("Tool result: {}...", preview(&content, LOGGED_RESULT_CHARS));
                messages.push(Message::tool_result(&tool_call.id, content));
            }
        }

        info!(
            "Agent execution completed in {} iterations, {} ms",
            iteration,
            start_time.elapsed().as_millis()
        );

        // The system prompt is never part of the returned trace.
        messages.remove(0);
        Ok(messages)
    }

    /// Executes a single tool call
    ///
    /// An unknown tool name or unparseable arguments produce an error result
    /// for the model to read, so it can correct the call.
    ///
    /// # Errors
    ///
    /// Failures reaching the tool (MCP transport errors, timeouts) propagate
    /// unchanged
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let tool_name = &tool_call.function.name;
        debug!("Executing tool: {}", tool_name);

        let Some(tool_executor) = self.tools.get(tool_name) else {
            warn!("Model called unknown tool: {}", tool_name);
            return Ok(ToolResult::error(format!(
                "{} is not a valid tool, try one of [{}].",
                tool_name,
                self.tools.names().join(", ")
            )));
        };

        let args = match parse_arguments(&tool_call.function.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!("Unparseable arguments for tool {}: {}", tool_name, e);
                return Ok(ToolResult::error(format!(
                    "Failed to parse tool arguments for '{}': {}",
                    tool_name, e
                )));
            }
        };

        let result = tool_executor.execute(args).await?;

        let max_output_size = self.config.max_output_size;
        let original_len = result.output.len();
        let truncated_result = result.truncate_if_needed(max_output_size);

        if truncated_result.truncated {
            debug!(
                "Tool output truncated from {} to {} bytes",
                original_len, max_output_size
            );
        }

        Ok(truncated_result)
    }

    /// Returns the number of registered tools
    pub fn num_tools(&self) -> usize {
        self.tools.len()
    }
}

/// Blank arguments mean "no arguments"
fn parse_arguments(raw: &str) -> serde_json::Result<serde_json::Value> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
}

fn describe_calls(calls: &[ToolCall]) -> String {
    calls
        .iter()
        .map(|c| format!("{}({})", c.function.name, c.function.arguments))
        .collect::<Vec<_>>()
        .join(", ")
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
