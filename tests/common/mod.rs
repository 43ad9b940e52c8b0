//! Common test utilities for makefile-mcp tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use makefile_mcp::config::Config;
use makefile_mcp::mcp::MakefileMcpServer;
use makefile_mcp::workdir::WorkingDirectoryState;

/// Creates a temporary directory with a Makefile
pub fn create_makefile_project(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let makefile_path = dir.path().join("Makefile");
    std::fs::write(&makefile_path, content).expect("Failed to write Makefile");
    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Creates a temporary directory with no build files
pub fn create_empty_project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().to_path_buf();
    (dir, path)
}

/// Whether a real make binary is installed
pub fn make_available() -> bool {
    which::which("make").is_ok()
}

/// Server over the Makefile in `dir`, with config tweaks applied
pub fn server_for(dir: &Path, tweak: impl FnOnce(&mut Config)) -> MakefileMcpServer {
    let mut config = Config::default();
    tweak(&mut config);
    let settings = config.resolve(dir).expect("Failed to resolve settings");
    let workdir = Arc::new(WorkingDirectoryState::new(None, None, dir));
    MakefileMcpServer::new(settings, workdir).expect("Failed to create server")
}

/// Build tool arguments from a JSON literal
pub fn tool_args(value: serde_json::Value) -> Option<serde_json::Map<String, serde_json::Value>> {
    value.as_object().cloned()
}

/// Sample Makefile content for testing
pub const SAMPLE_MAKEFILE: &str = r#"
.PHONY: build test clean deploy slow echo-args

build: ## Build the project
	@echo "Building..."

test: build ## Run tests
	@echo "Testing..."

# Not exposed: no ## description
clean:
	@echo "Cleaning..."

deploy: ARG ?= production
deploy: ## Ship it
	@echo "Deploying to $(ARG)..."

slow: ## Takes a while
	@echo started; sleep 30

echo-args: ## Print the words make received
	@echo "goals: $(MAKECMDGOALS)"

%:
	@echo "pattern rule caught $@"
"#;
