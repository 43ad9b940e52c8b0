//! Error types for makefile-mcp
//!
//! Provides structured error types with suggestions for common issues.

use serde::Serialize;
use thiserror::Error;

/// Main error type for discovery and execution
#[derive(Error, Debug)]
pub enum TaskError {
    /// Makefile does not exist at the configured path
    #[error("Makefile not found: {path}")]
    FileNotFound { path: String },

    /// Makefile exists but cannot be read
    #[error("Permission denied reading Makefile: {path}")]
    PermissionDenied { path: String },

    /// Resolved working directory is missing or not a directory
    #[error("Invalid working directory '{path}': {reason}")]
    InvalidWorkingDirectory { path: String, reason: String },

    /// Target name not declared in the Makefile
    #[error("Unknown target '{target}'")]
    UnknownTarget {
        target: String,
        available: Vec<String>,
    },

    /// Extra arguments could not be split into words
    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// Include/exclude glob failed to compile
    #[error("Invalid glob pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },

    /// Failed to spawn the command
    #[error("Failed to spawn command: {command}")]
    SpawnFailed { command: String, error: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    /// Map an IO error from opening the Makefile to the matching variant
    pub fn from_makefile_io(path: &std::path::Path, err: std::io::Error) -> Self {
        let path = path.display().to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => TaskError::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => TaskError::PermissionDenied { path },
            _ => TaskError::Io(err),
        }
    }
}

/// Serializable error info for MCP responses
#[derive(Debug, Serialize, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

impl ErrorInfo {
    fn simple(err: &TaskError, error_type: &str, suggestion: Option<String>) -> Self {
        ErrorInfo {
            message: err.to_string(),
            error_type: error_type.to_string(),
            suggestion,
            exit_code: None,
            stderr: None,
            available: vec![],
        }
    }
}

impl From<&TaskError> for ErrorInfo {
    fn from(err: &TaskError) -> Self {
        match err {
            TaskError::FileNotFound { .. } => ErrorInfo::simple(
                err,
                "file_not_found",
                Some("Pass the Makefile location with --makefile".to_string()),
            ),
            TaskError::PermissionDenied { .. } => ErrorInfo::simple(
                err,
                "permission_denied",
                Some("Check the Makefile's file permissions".to_string()),
            ),
            TaskError::InvalidWorkingDirectory { .. } => ErrorInfo::simple(
                err,
                "invalid_working_directory",
                Some(
                    "Call set_working_directory with an existing directory, or clear it with null"
                        .to_string(),
                ),
            ),
            TaskError::UnknownTarget { available, .. } => ErrorInfo {
                available: available.clone(),
                ..ErrorInfo::simple(
                    err,
                    "unknown_target",
                    Some("Read makefile://targets to see declared targets".to_string()),
                )
            },
            TaskError::InvalidArguments { .. } => ErrorInfo::simple(
                err,
                "invalid_arguments",
                Some("Balance quotes in 'args' or escape them".to_string()),
            ),
            TaskError::InvalidPattern { .. } => ErrorInfo::simple(
                err,
                "invalid_pattern",
                Some("Use shell-style globs such as 'test*' or 'build-[ab]'".to_string()),
            ),
            TaskError::SpawnFailed { error, .. } => ErrorInfo::simple(
                err,
                "spawn_failed",
                Some(format!("Check if the command exists: {}", error)),
            ),
            TaskError::Config(_) => ErrorInfo::simple(
                err,
                "config_error",
                Some("Check your makefile-mcp configuration file".to_string()),
            ),
            TaskError::Io(_) => ErrorInfo::simple(err, "io_error", None),
        }
    }
}

/// Suggest fixes for common make failures
pub fn suggest_fix(command: &str, stderr: &str) -> Option<String> {
    if stderr.contains("No rule to make target") {
        return Some(
            "Target not found in Makefile. Read makefile://targets to see available targets."
                .to_string(),
        );
    }

    if stderr.contains("missing separator") {
        return Some(
            "Recipe lines must start with a tab character, not spaces.".to_string(),
        );
    }

    if stderr.contains("Permission denied") {
        return Some(
            "Permission denied. Check file permissions or run with appropriate access.".to_string(),
        );
    }

    if stderr.contains("command not found") || stderr.contains("not found") {
        if command.starts_with("make") && stderr.contains("make") {
            return Some("'make' command not found. Install build-essential or make.".to_string());
        }
        return Some("A recipe command was not found. Check PATH and dependencies.".to_string());
    }

    if stderr.contains("No such file") {
        return Some(
            "File not found. Check the working directory with set_working_directory.".to_string(),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = TaskError::FileNotFound {
            path: "/nonexistent/Makefile".to_string(),
        };
        assert_eq!(err.to_string(), "Makefile not found: /nonexistent/Makefile");

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "file_not_found");
        assert!(info.suggestion.unwrap().contains("--makefile"));
    }

    #[test]
    fn test_from_makefile_io_maps_kinds() {
        let path = std::path::Path::new("/x/Makefile");

        let not_found = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(
            TaskError::from_makefile_io(path, not_found),
            TaskError::FileNotFound { .. }
        ));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            TaskError::from_makefile_io(path, denied),
            TaskError::PermissionDenied { .. }
        ));

        let other = std::io::Error::other("boom");
        assert!(matches!(
            TaskError::from_makefile_io(path, other),
            TaskError::Io(_)
        ));
    }

    #[test]
    fn test_unknown_target_error() {
        let err = TaskError::UnknownTarget {
            target: "deploy".to_string(),
            available: vec!["build".to_string(), "test".to_string()],
        };
        assert_eq!(err.to_string(), "Unknown target 'deploy'");

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "unknown_target");
        assert!(info.available.contains(&"build".to_string()));
    }

    #[test]
    fn test_invalid_working_directory_error() {
        let err = TaskError::InvalidWorkingDirectory {
            path: "/gone".to_string(),
            reason: "does not exist".to_string(),
        };
        assert!(err.to_string().contains("/gone"));
        assert!(err.to_string().contains("does not exist"));

        let info = ErrorInfo::from(&err);
        assert_eq!(info.error_type, "invalid_working_directory");
    }

    #[test]
    fn test_suggest_fix_missing_rule() {
        let suggestion = suggest_fix("make deploy", "make: *** No rule to make target 'deploy'");
        assert!(suggestion.unwrap().contains("makefile://targets"));
    }

    #[test]
    fn test_suggest_fix_missing_separator() {
        let suggestion = suggest_fix("make build", "Makefile:3: *** missing separator.  Stop.");
        assert!(suggestion.unwrap().contains("tab"));
    }

    #[test]
    fn test_suggest_fix_permission_denied() {
        let suggestion = suggest_fix("make build", "/bin/sh: ./run.sh: Permission denied");
        assert!(suggestion.unwrap().contains("Permission"));
    }

    #[test]
    fn test_suggest_fix_command_not_found() {
        let suggestion = suggest_fix("make lint", "/bin/sh: 1: ruff: not found");
        assert!(suggestion.unwrap().contains("recipe command"));
    }

    #[test]
    fn test_suggest_fix_no_match() {
        let suggestion = suggest_fix("make build", "some random error");
        assert!(suggestion.is_none());
    }

    #[test]
    fn test_error_info_skips_empty_fields() {
        let info = ErrorInfo::from(&TaskError::Io(std::io::Error::other("disk")));

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("suggestion"));
        assert!(!json.contains("exit_code"));
        assert!(!json.contains("stderr"));
        assert!(!json.contains("available"));
    }
}
