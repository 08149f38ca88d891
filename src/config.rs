//! Configuration management for mcp-agent-api
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence, lowest first: YAML file, environment (including `.env`),
//! command-line flags.

use crate::error::{AgentApiError, Result};
use crate::mcp::config::{McpConfig, WEATHER_SERVER_NAME};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat model endpoint settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// MCP servers that supply the agent's tools
    #[serde(default)]
    pub mcp: McpConfig,

    /// Agent loop limits and prompt
    #[serde(default)]
    pub agent: AgentConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// OpenAI-compatible chat completions endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Model identifier sent with every request
    #[serde(default)]
    pub model: Option<String>,

    /// Bearer credential
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Sampling temperature; 0 keeps the agent deterministic
    #[serde(default)]
    pub temperature: f32,

    /// Per-call HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_api_key() -> String {
    "fake".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key: default_api_key(),
            temperature: 0.0,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Agent execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of model calls per query
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Deadline for a single query, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Tool output beyond this many bytes is truncated before it reaches the model
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,

    /// Replaces the built-in weather assistant prompt when set
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_max_turns() -> usize {
    50
}

fn default_timeout() -> u64 {
    300
}

fn default_max_output() -> usize {
    16 * 1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            timeout_seconds: default_timeout(),
            max_output_size: default_max_output(),
            system_prompt: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged, so a deployment can be configured purely from the environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line arguments
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Config` if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentApiError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AgentApiError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("LLAMA_STACK_OPENAI_ENDPOINT") {
            self.provider.endpoint = Some(endpoint);
        }

        if let Ok(model) = std::env::var("INFERENCE_MODEL") {
            self.provider.model = Some(model);
        }

        if let Ok(api_key) = std::env::var("API_KEY") {
            self.provider.api_key = api_key;
        }

        if let Ok(temperature) = std::env::var("MCP_AGENT_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                self.provider.temperature = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_TEMPERATURE: {}", temperature);
            }
        }

        if let Ok(url) = std::env::var("MCP_WEATHER_SERVER_URL") {
            self.mcp.upsert_server_url(WEATHER_SERVER_NAME, url);
        }

        if let Ok(host) = std::env::var("MCP_AGENT_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid PORT: {}", port);
            }
        }

        if let Ok(max_turns) = std::env::var("MCP_AGENT_MAX_TURNS") {
            if let Ok(value) = max_turns.parse() {
                self.agent.max_turns = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_MAX_TURNS: {}", max_turns);
            }
        }

        if let Ok(timeout) = std::env::var("MCP_AGENT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.agent.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MCP_AGENT_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
    }

    /// Validate the configuration
    ///
    /// Runs before anything is started so misconfiguration fails the process
    /// instead of surfacing on the first request.
    ///
    /// # Errors
    ///
    /// Returns `AgentApiError::Config` naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.provider.endpoint.as_deref().unwrap_or_default();
        if endpoint.trim().is_empty() {
            return Err(AgentApiError::Config(
                "provider.endpoint must be set (LLAMA_STACK_OPENAI_ENDPOINT)".to_string(),
            )
            .into());
        }
        validate_http_url("provider.endpoint", endpoint)?;

        let model = self.provider.model.as_deref().unwrap_or_default();
        if model.trim().is_empty() {
            return Err(AgentApiError::Config(
                "provider.model must be set (INFERENCE_MODEL)".to_string(),
            )
            .into());
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(AgentApiError::Config(
                "provider.temperature must be between 0.0 and 2.0".to_string(),
            )
            .into());
        }

        if self.provider.request_timeout_seconds == 0 {
            return Err(AgentApiError::Config(
                "provider.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.mcp.servers.is_empty() {
            return Err(AgentApiError::Config(
                "at least one MCP server must be configured (MCP_WEATHER_SERVER_URL)".to_string(),
            )
            .into());
        }

        let mut seen = std::collections::HashSet::new();
        for server in &self.mcp.servers {
            if server.name.trim().is_empty() {
                return Err(
                    AgentApiError::Config("MCP server name cannot be empty".to_string()).into(),
                );
            }
            if !seen.insert(server.name.as_str()) {
                return Err(AgentApiError::Config(format!(
                    "duplicate MCP server name: {}",
                    server.name
                ))
                .into());
            }
            validate_http_url(&format!("mcp server '{}' url", server.name), &server.url)?;
            if server.timeout_seconds == 0 {
                return Err(AgentApiError::Config(format!(
                    "mcp server '{}' timeout_seconds must be greater than 0",
                    server.name
                ))
                .into());
            }
        }

        if self.agent.max_turns == 0 {
            return Err(
                AgentApiError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_turns > 1000 {
            return Err(AgentApiError::Config(
                "max_turns must be less than or equal to 1000".to_string(),
            )
            .into());
        }

        if self.agent.timeout_seconds == 0 {
            return Err(
                AgentApiError::Config("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        if self.agent.max_output_size == 0 {
            return Err(AgentApiError::Config(
                "agent.max_output_size must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AgentApiError::Config(format!("{} is not a valid URL: {}", field, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AgentApiError::Config(format!(
            "{} must use http or https, got {}",
            field, other
        ))
        .into()),
    }
}
