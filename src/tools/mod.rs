//! Tools module for mcp-agent-api
//!
//! This module contains the tool abstraction the agent calls through, the
//! result type fed back to the model, and the registry that holds the tools
//! discovered from MCP servers.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Name and description of a tool, as reported by `GET /tools`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name the model calls
    pub name: String,
    /// Human-readable description; empty when the server gave none
    pub description: String,
}

impl ToolDescriptor {
    /// Build a descriptor from a `{name, description, ...}` definition
    pub fn from_definition(definition: &serde_json::Value) -> Self {
        let text = |key: &str| {
            definition
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            name: text("name"),
            description: text("description"),
        }
    }
}

/// Tool result structure
///
/// Represents the result of a tool execution with truncation support.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Whether the tool execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
    /// Whether the output was truncated
    pub truncated: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
            truncated: false,
        }
    }

    /// Create a failed tool result
    ///
    /// Failed results are still returned to the model so it can recover.
    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            truncated: false,
        }
    }

    /// Truncate output if it exceeds the maximum size
    ///
    /// The cut lands on a character boundary at or below `max_size` bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use mcp_agent_api::tools::ToolResult;
    ///
    /// let result = ToolResult::success("héllo".to_string()).truncate_if_needed(2);
    /// assert!(result.truncated);
    /// assert!(result.output.starts_with('h'));
    /// ```
    pub fn truncate_if_needed(mut self, max_size: usize) -> Self {
        if self.output.len() > max_size {
            let mut cut = max_size;
            while !self.output.is_char_boundary(cut) {
                cut -= 1;
            }
            self.output.truncate(cut);
            self.output.push_str("\n... (truncated)");
            self.truncated = true;
        }
        self
    }

    /// Convert to a message string for the conversation
    pub fn to_message(&self) -> String {
        if self.success {
            if self.truncated {
                format!("{}\n(Output truncated to fit context window)", self.output)
            } else {
                self.output.clone()
            }
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Tool executor trait for implementing tool execution logic
///
/// # Examples
///
/// ```no_run
/// use mcp_agent_api::tools::{ToolExecutor, ToolResult};
/// use mcp_agent_api::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct Echo;
///
/// #[async_trait]
/// impl ToolExecutor for Echo {
///     fn tool_definition(&self) -> Value {
///         serde_json::json!({
///             "name": "echo",
///             "description": "Echo the input",
///             "parameters": {"type": "object", "properties": {}}
///         })
///     }
///
///     async fn execute(&self, args: Value) -> Result<ToolResult> {
///         Ok(ToolResult::success(args.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition as a `{name, description, parameters}` object
    fn tool_definition(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error if the tool could not be reached at all; failures the
    /// tool itself reports come back as [`ToolResult::error`]
    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult>;
}

/// Tool registry for managing available tools
///
/// Tools keep the order they were registered in, which is the order MCP
/// servers listed them.
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn ToolExecutor>)>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool executor in the registry
    ///
    /// Returns `false` and keeps the existing tool when the name is taken.
    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn ToolExecutor>) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            tracing::warn!("Tool {} already registered, keeping the first definition", name);
            return false;
        }
        self.index.insert(name.clone(), self.tools.len());
        self.tools.push((name, executor));
        true
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i].1))
    }

    /// Registered tool names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Get all tool definitions as JSON values, in registration order
    pub fn all_definitions(&self) -> Vec<serde_json::Value> {
        self.tools
            .iter()
            .map(|(_, executor)| executor.tool_definition())
            .collect()
    }

    /// Name and description of every tool, in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|(name, executor)| {
                let mut descriptor = ToolDescriptor::from_definition(&executor.tool_definition());
                descriptor.name = name.clone();
                descriptor
            })
            .collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
