//! Working-directory resolution
//!
//! The directory make runs in comes from the first source that is set:
//!
//! 1. an override set at runtime through `set_working_directory`
//! 2. the CLI value (`--cwd`, or `execution.working_dir` from config)
//! 3. the `MAKEFILE_MCP_CWD` environment variable
//! 4. the process working directory captured at startup
//!
//! Only the override can change after startup.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::TaskError;

/// Environment variable consulted below the CLI value
pub const WORKDIR_ENV_VAR: &str = "MAKEFILE_MCP_CWD";

/// Process-wide working-directory state
#[derive(Debug)]
pub struct WorkingDirectoryState {
    tool_override: Mutex<Option<PathBuf>>,
    cli_value: Option<PathBuf>,
    env_value: Option<PathBuf>,
    startup_dir: PathBuf,
}

impl WorkingDirectoryState {
    /// Create state from explicit sources; blank values count as unset
    pub fn new(
        cli_value: Option<PathBuf>,
        env_value: Option<PathBuf>,
        startup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            tool_override: Mutex::new(None),
            cli_value: cli_value.filter(|p| !p.as_os_str().is_empty()),
            env_value: env_value.filter(|p| !p.as_os_str().is_empty()),
            startup_dir: startup_dir.into(),
        }
    }

    /// Capture the environment value and current directory of this process
    pub fn from_process(cli_value: Option<PathBuf>) -> std::io::Result<Self> {
        let env_value = std::env::var_os(WORKDIR_ENV_VAR).map(PathBuf::from);
        let startup_dir = std::env::current_dir()?;
        Ok(Self::new(cli_value, env_value, startup_dir))
    }

    fn cell(&self) -> MutexGuard<'_, Option<PathBuf>> {
        self.tool_override
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Effective directory, without checking it exists
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = self.cell().clone() {
            return path;
        }
        self.static_dir().to_path_buf()
    }

    /// Directory from the fixed sources, ignoring any override
    pub fn static_dir(&self) -> &Path {
        self.cli_value
            .as_deref()
            .or(self.env_value.as_deref())
            .unwrap_or(&self.startup_dir)
    }

    /// Effective directory, failing if it is missing or not a directory
    ///
    /// # Errors
    /// * `TaskError::InvalidWorkingDirectory` - The path does not exist or is a file
    pub fn resolve_validated(&self) -> Result<PathBuf, TaskError> {
        let path = self.resolve();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(TaskError::InvalidWorkingDirectory {
                path: path.display().to_string(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(TaskError::InvalidWorkingDirectory {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Set or clear the runtime override and return the new effective directory
    ///
    /// `None` or a blank string clears the override. Other values are stored
    /// after `~` expansion, with relative paths joined onto the startup
    /// directory; they are validated when a command runs.
    pub fn set_override(&self, path: Option<&str>) -> PathBuf {
        let value = path
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(crate::config::expand_path)
            .map(|p| self.startup_dir.join(p));

        let mut cell = self.cell();
        *cell = value.clone();
        drop(cell);

        match value {
            Some(path) => {
                tracing::info!("Working directory override set to {}", path.display());
                path
            }
            None => {
                let fallback = self.static_dir().to_path_buf();
                tracing::info!(
                    "Working directory override cleared, using {}",
                    fallback.display()
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state(cli: Option<&str>, env: Option<&str>) -> WorkingDirectoryState {
        WorkingDirectoryState::new(cli.map(PathBuf::from), env.map(PathBuf::from), "/startup")
    }

    #[test]
    fn test_startup_dir_is_last_resort() {
        assert_eq!(state(None, None).resolve(), PathBuf::from("/startup"));
    }

    #[test]
    fn test_env_beats_startup() {
        assert_eq!(state(None, Some("/a")).resolve(), PathBuf::from("/a"));
    }

    #[test]
    fn test_precedence_chain() {
        let state = state(Some("/b"), Some("/a"));
        assert_eq!(state.resolve(), PathBuf::from("/b"));

        let effective = state.set_override(Some("/c"));
        assert_eq!(effective, PathBuf::from("/c"));
        assert_eq!(state.resolve(), PathBuf::from("/c"));

        let effective = state.set_override(None);
        assert_eq!(effective, PathBuf::from("/b"));
        assert_eq!(state.resolve(), PathBuf::from("/b"));
    }

    #[test]
    fn test_empty_override_clears() {
        let state = state(None, Some("/a"));
        state.set_override(Some("/c"));

        assert_eq!(state.set_override(Some("  ")), PathBuf::from("/a"));
        assert_eq!(state.resolve(), PathBuf::from("/a"));
    }

    #[test]
    fn test_blank_sources_are_unset() {
        let state = WorkingDirectoryState::new(Some(PathBuf::new()), Some(PathBuf::new()), "/s");
        assert_eq!(state.resolve(), PathBuf::from("/s"));
    }

    #[test]
    fn test_relative_override_joins_startup_dir() {
        let state = state(Some("/b"), None);

        let effective = state.set_override(Some("sub/project"));
        assert_eq!(effective, PathBuf::from("/startup/sub/project"));
        assert_eq!(state.resolve(), PathBuf::from("/startup/sub/project"));
    }

    #[test]
    fn test_override_is_not_validated_on_set() {
        let state = state(None, None);
        let effective = state.set_override(Some("/definitely/not/here"));

        assert_eq!(effective, PathBuf::from("/definitely/not/here"));
    }

    #[test]
    fn test_resolve_validated_ok() {
        let dir = TempDir::new().unwrap();
        let state = WorkingDirectoryState::new(Some(dir.path().to_path_buf()), None, "/startup");

        assert_eq!(state.resolve_validated().unwrap(), dir.path());
    }

    #[test]
    fn test_resolve_validated_missing() {
        let state = state(None, None);
        state.set_override(Some("/definitely/not/here"));

        match state.resolve_validated() {
            Err(TaskError::InvalidWorkingDirectory { path, .. }) => {
                assert_eq!(path, "/definitely/not/here");
            }
            other => panic!("Expected InvalidWorkingDirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_validated_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("Makefile");
        std::fs::write(&file, "all:\n").unwrap();

        let state = WorkingDirectoryState::new(Some(file), None, "/startup");
        match state.resolve_validated() {
            Err(TaskError::InvalidWorkingDirectory { reason, .. }) => {
                assert_eq!(reason, "not a directory");
            }
            other => panic!("Expected InvalidWorkingDirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_set_and_resolve() {
        let state = std::sync::Arc::new(state(Some("/b"), None));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    let path = format!("/dir{}", i);
                    state.set_override(Some(&path));
                    let seen = state.resolve();
                    assert!(seen.to_string_lossy().starts_with("/dir"));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(state.resolve().to_string_lossy().starts_with("/dir"));
    }
}
