//! OpenAI-compatible provider implementation for mcp-agent-api
//!
//! This module implements the Provider trait for any server exposing the
//! OpenAI chat completions API (Llama Stack's `/v1/openai/v1` surface, vLLM,
//! Ollama's compatibility layer). Requests are non-streaming and tools are
//! sent in the `function` format.

use crate::config::ProviderConfig;
use crate::error::{AgentApiError, Result};
use crate::providers::{
    CompletionResponse, FunctionCall, Message, Provider, Role, TokenUsage, ToolCall,
};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI-compatible chat completions provider
///
/// # Examples
///
/// ```no_run
/// use mcp_agent_api::config::ProviderConfig;
/// use mcp_agent_api::providers::{OpenAiProvider, Provider, Message};
///
/// # async fn example() -> mcp_agent_api::error::Result<()> {
/// let config = ProviderConfig {
///     endpoint: Some("http://localhost:8321/v1/openai/v1".to_string()),
///     model: Some("llama3.2:3b".to_string()),
///     ..ProviderConfig::default()
/// };
/// let provider = OpenAiProvider::new(&config)?;
/// let completion = provider.complete(&[Message::user("Hello!")], &[]).await?;
/// # Ok(())
/// # }
/// ```
pub struct OpenAiProvider {
    client: Client,
    url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

/// Request body for `POST /chat/completions`
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    temperature: f32,
    stream: bool,
}

/// Message in OpenAI wire format
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// Tool definition in OpenAI wire format
#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: &'static str,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call in OpenAI wire format
#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "default_tool_type")]
    r#type: String,
    function: ChatFunctionCall,
}

/// Arguments are a JSON string on the wire, though some servers send an object
#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

fn default_tool_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

impl OpenAiProvider {
    /// Create a new provider from validated configuration
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Provider` if the endpoint or model is missing
    /// or the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::config::ProviderConfig;
    /// use mcp_agent_api::providers::{OpenAiProvider, Provider};
    ///
    /// let config = ProviderConfig {
    ///     endpoint: Some("http://localhost:8321/v1/openai/v1/".to_string()),
    ///     model: Some("llama3.2:3b".to_string()),
    ///     ..ProviderConfig::default()
    /// };
    /// let provider = OpenAiProvider::new(&config).unwrap();
    /// assert_eq!(provider.model(), "llama3.2:3b");
    /// assert_eq!(provider.url(), "http://localhost:8321/v1/openai/v1/chat/completions");
    /// ```
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AgentApiError::Provider("endpoint is not configured".to_string()))?;
        let model = config
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| AgentApiError::Provider("model is not configured".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentApiError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        let url = format!("{}/chat/completions", endpoint.trim_end_matches('/'));

        tracing::info!("Initialized OpenAI-compatible provider: url={}, model={}", url, model);

        Ok(Self {
            client,
            url,
            model: model.to_string(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    /// Full chat completions URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<ChatMessage> {
        crate::providers::validate_message_sequence(messages)
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content,
                tool_calls: m.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|tc| ChatToolCall {
                            id: tc.id,
                            r#type: default_tool_type(),
                            function: ChatFunctionCall {
                                name: tc.function.name,
                                arguments: serde_json::Value::String(tc.function.arguments),
                            },
                        })
                        .collect()
                }),
                tool_call_id: m.tool_call_id,
            })
            .collect()
    }

    fn convert_tools(&self, tools: &[serde_json::Value]) -> Vec<ChatTool> {
        tools
            .iter()
            .filter_map(|t| {
                let obj = t.as_object()?;
                let name = obj.get("name")?.as_str()?.to_string();
                let description = obj
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string();
                let parameters = obj
                    .get("parameters")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}}));

                Some(ChatTool {
                    r#type: "function",
                    function: ChatFunction {
                        name,
                        description,
                        parameters,
                    },
                })
            })
            .collect()
    }

    fn convert_response_message(&self, chat_msg: ChatMessage) -> Message {
        let tool_calls: Vec<ToolCall> = chat_msg
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCall {
                id: if tc.id.is_empty() {
                    format!("call_{}", uuid::Uuid::new_v4().simple())
                } else {
                    tc.id
                },
                function: FunctionCall {
                    name: tc.function.name,
                    arguments: match tc.function.arguments {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    },
                },
            })
            .collect();

        if tool_calls.is_empty() {
            Message {
                role: Role::Assistant,
                content: chat_msg.content,
                tool_calls: None,
                tool_call_id: None,
            }
        } else {
            Message::assistant_with_tools(chat_msg.content, tool_calls)
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[serde_json::Value],
    ) -> Result<CompletionResponse> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: self.convert_messages(messages),
            tools: self.convert_tools(tools),
            temperature: self.temperature,
            stream: false,
        };

        tracing::debug!(
            "Sending chat completion request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Chat completion request failed: {}", e);
                AgentApiError::Provider(format!("Chat completion request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Model endpoint returned error {}: {}", status, error_text);
            return Err(AgentApiError::Provider(format!(
                "Model endpoint returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse chat completion response: {}", e);
            AgentApiError::Provider(format!("Failed to parse chat completion response: {}", e))
        })?;

        let choice = chat_response.choices.into_iter().next().ok_or_else(|| {
            AgentApiError::Provider("Chat completion response contained no choices".to_string())
        })?;

        tracing::debug!(
            "Chat completion finished: finish_reason={}",
            choice.finish_reason.as_deref().unwrap_or("none")
        );

        let message = self.convert_response_message(choice.message);

        Ok(match chat_response.usage {
            Some(usage) => CompletionResponse::with_usage(
                message,
                TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            ),
            None => CompletionResponse::new(message),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}
