//! Configuration loader with XDG-compliant path resolution
//!
//! Loads configuration from multiple locations with layered priority:
//! 1. `/etc/makefile-mcp/config.toml` (lowest priority)
//! 2. `~/.config/makefile-mcp/config.toml`
//! 3. `~/.makefile-mcp.toml`
//! 4. `./.makefile-mcp.toml`
//! 5. `--config <file>`
//! 6. `MAKEFILE_MCP_*` environment variables (highest priority)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;

/// Application name used for XDG directories
const APP_NAME: &str = "makefile-mcp";

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "MAKEFILE_MCP_";

/// Get XDG config search paths in priority order (lowest to highest)
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from(format!("/etc/{}/config.toml", APP_NAME)));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(APP_NAME).join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}.toml", APP_NAME)));
    }

    paths.push(PathBuf::from(format!(".{}.toml", APP_NAME)));

    paths
}

/// Load configuration with XDG layering
///
/// Later files override earlier ones. Environment variables with prefix
/// `MAKEFILE_MCP_` override all file-based configuration, except
/// `MAKEFILE_MCP_CWD` which belongs to the working-directory resolver.
///
/// # Arguments
/// * `override_path` - Optional config file layered above the XDG files
///
/// # Errors
/// Fails when an explicit override file is missing or any layer does not
/// deserialize.
pub fn load_config(override_path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

    for path in config_paths() {
        if path.exists() {
            tracing::debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        }
    }

    if let Some(path) = override_path {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        tracing::debug!("Loading override config from: {}", path.display());
        figment = figment.merge(Toml::file(path));
    }

    // MAKEFILE_MCP_EXECUTION__TIMEOUT=600 -> execution.timeout = 600
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["cwd"]));

    figment.extract().context("Failed to load configuration")
}
