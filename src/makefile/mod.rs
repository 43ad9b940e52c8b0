//! Makefile discovery
//!
//! Turns a Makefile into MCP tool descriptors:
//! - `parser`: declaration lines to `TargetRecord`s
//! - `filter`: include/exclude globs
//! - `tools`: tool ids, schemas and the fallback tool
//! - `catalog`: the whole pipeline plus the target summary

pub mod catalog;
pub mod filter;
pub mod parser;
pub mod tools;

pub use catalog::{Catalog, CatalogEntry, Exposure};
pub use filter::{Rejection, TargetFilter};
pub use parser::{parse_makefile, parse_makefile_str, read_makefile, TargetRecord, DOC_MARKER};
pub use tools::{
    sanitize_tool_id, synthesize, FallbackToolParams, SynthesisOptions, TargetToolParams,
    ToolDescriptor, ToolKind, ToolSet, BUILTIN_TOOL_IDS, DEFAULT_PREFIX, FALLBACK_TOOL_ID,
    REFRESH_TOOL_ID, WORKDIR_TOOL_ID,
};
