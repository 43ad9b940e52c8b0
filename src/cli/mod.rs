//! CLI module for makefile-mcp
//!
//! - default: start the MCP server over stdio
//! - `--list`: print discovered targets and exit

pub mod commands;
pub mod mcp;

pub use commands::{Cli, LogFormat, OutputFormat};
pub use mcp::run_mcp_server;
