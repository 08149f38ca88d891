//! Agent module for mcp-agent-api
//!
//! This module contains the tool-calling execution loop that backs the
//! query endpoints.

pub mod core;

pub use core::Agent;
