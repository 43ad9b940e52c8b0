//! Configuration model for makefile-mcp
//!
//! Defines the structure for XDG-compliant layered configuration and the
//! resolved settings the server runs with.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Which Makefile to read
    #[serde(default)]
    pub makefile: MakefileConfig,

    /// Which targets become tools
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// How make is invoked
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Makefile location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MakefileConfig {
    /// Path to the Makefile, relative paths resolve against the working directory
    #[serde(default = "default_makefile_path")]
    pub path: String,
}

fn default_makefile_path() -> String {
    "Makefile".to_string()
}

impl Default for MakefileConfig {
    fn default() -> Self {
        Self {
            path: default_makefile_path(),
        }
    }
}

/// Target discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Glob patterns a target must match to be exposed
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns that hide a target
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Prefix for generated tool ids
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Expose targets that have no `##` description
    #[serde(default)]
    pub all_targets: bool,
}

fn default_prefix() -> String {
    crate::makefile::DEFAULT_PREFIX.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            include: vec![],
            exclude: vec![],
            prefix: default_prefix(),
            all_targets: false,
        }
    }
}

/// Execution settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Command used to run make
    #[serde(default = "default_make_command")]
    pub command: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Working directory for make (same tier as `--cwd`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Max bytes captured per output stream
    #[serde(default = "default_max_output_size")]
    pub max_output_size: usize,
}

fn default_make_command() -> String {
    "make".to_string()
}

fn default_timeout() -> u64 {
    300
}

fn default_max_output_size() -> usize {
    100_000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command: default_make_command(),
            timeout: default_timeout(),
            working_dir: None,
            max_output_size: default_max_output_size(),
        }
    }
}

/// Settings after path expansion and validation
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    /// Absolute (or working-directory-relative) path of the Makefile
    pub makefile: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub prefix: String,
    pub all_targets: bool,
    pub make_command: String,
    pub timeout: Duration,
    pub max_output_size: usize,
}

impl Config {
    /// Validate and resolve paths against `base_dir`
    ///
    /// # Errors
    /// * `TaskError::Config` - The timeout is zero or the make command is empty
    pub fn resolve(&self, base_dir: &Path) -> Result<ResolvedSettings, TaskError> {
        if self.execution.timeout == 0 {
            return Err(TaskError::Config(
                "execution.timeout must be at least 1 second".to_string(),
            ));
        }
        if self.execution.command.trim().is_empty() {
            return Err(TaskError::Config(
                "execution.command must not be empty".to_string(),
            ));
        }

        let makefile = expand_path(&self.makefile.path);
        let makefile = if makefile.is_absolute() {
            makefile
        } else {
            base_dir.join(makefile)
        };

        Ok(ResolvedSettings {
            makefile,
            include: self.discovery.include.clone(),
            exclude: self.discovery.exclude.clone(),
            prefix: self.discovery.prefix.clone(),
            all_targets: self.discovery.all_targets,
            make_command: self.execution.command.clone(),
            timeout: Duration::from_secs(self.execution.timeout),
            max_output_size: self.execution.max_output_size,
        })
    }

    /// Expanded working directory from config, if set
    pub fn working_dir(&self) -> Option<PathBuf> {
        self.execution
            .working_dir
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(expand_path)
    }
}

/// Expand `~` and `$VAR` in a path; unknown variables are left as written
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| shellexpand::tilde(path).into_owned());
    PathBuf::from(expanded)
}
