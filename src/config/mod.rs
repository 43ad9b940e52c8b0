//! Configuration module for makefile-mcp
//!
//! Provides XDG-compliant layered configuration loading with
//! environment variable overrides.

pub mod loader;
pub mod model;

pub use loader::{config_paths, load_config};
pub use model::*;
