//! MCP Server module
//!
//! Provides one MCP tool per documented Makefile target plus:
//! - `make` - Run any declared target by name
//! - `set_working_directory` - Change where make runs
//! - `refresh_targets` - Re-read the Makefile
//!
//! Resources `makefile://raw` and `makefile://targets` expose the Makefile
//! itself and a summary of its targets.

pub mod server;

pub use server::{MakefileMcpServer, ToolOutcome, RAW_RESOURCE_URI, TARGETS_RESOURCE_URI};
