//! makefile-mcp - Makefile targets as MCP tools
//!
//! Reads a Makefile, turns every `##`-documented target into an MCP tool and
//! runs make on request:
//!
//! - **Discovery** - target parsing, include/exclude globs, tool synthesis
//! - **Execution** - argument vectors only, timeouts, captured output
//! - **Working directory** - runtime override, `--cwd`, `MAKEFILE_MCP_CWD`, startup dir
//!
//! ## MCP Tools
//!
//! - `<prefix><target>` - Run one target (`args`, `dry_run`)
//! - `make` - Run any declared target by name
//! - `set_working_directory` - Change or clear the working directory override
//! - `refresh_targets` - Re-read the Makefile
//!
//! ## MCP Resources
//!
//! - `makefile://raw` - Makefile contents
//! - `makefile://targets` - Target summary

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod makefile;
pub mod mcp;
pub mod workdir;

pub use cli::Cli;
pub use config::{Config, ResolvedSettings};
pub use error::{ErrorInfo, TaskError};
pub use executor::{build_make_argv, exec_command, ExecOptions, ExecutionResult};
pub use makefile::{Catalog, TargetFilter, TargetRecord, ToolDescriptor, ToolKind};
pub use mcp::MakefileMcpServer;
pub use workdir::WorkingDirectoryState;
