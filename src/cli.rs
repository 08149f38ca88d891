//! Command-line interface definition for mcp-agent-api
//!
//! This module defines the CLI structure using clap's derive API. The service
//! has a single mode of operation, so there are no subcommands.

use clap::{Parser, ValueEnum};

/// mcp-agent-api - HTTP front end for an MCP tool-calling agent
///
/// Connects to the configured MCP servers, builds an agent around their
/// tools and serves it over HTTP.
#[derive(Parser, Debug, Clone)]
#[command(name = "mcp-agent-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Address to bind (overrides config and MCP_AGENT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Log line format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            host: None,
            port: None,
            verbose: false,
            log_format: LogFormat::Text,
        }
    }
}
