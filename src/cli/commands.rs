//! CLI definitions using clap
//!
//! One flat command: serve over stdio by default, or print the discovered
//! targets with `--list`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::Config;

/// MCP server that exposes Makefile targets as tools.
///
/// Every `##`-documented target becomes a tool named `<prefix><target>`.
/// A `make` tool runs any declared target by name.
#[derive(Parser, Debug)]
#[command(name = "makefile-mcp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the Makefile
    #[arg(short = 'm', long)]
    pub makefile: Option<String>,

    /// Working directory for make
    #[arg(short = 'C', long = "cwd")]
    pub cwd: Option<String>,

    /// Only expose targets matching these globs (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Hide targets matching these globs (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Prefix for tool names
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Timeout for make runs in seconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Print discovered targets and exit
    #[arg(short, long)]
    pub list: bool,

    /// Output format for --list
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Also expose targets without a ## description
    #[arg(long)]
    pub all_targets: bool,

    /// Command used to run make
    #[arg(long)]
    pub make_command: Option<String>,

    /// Config file path (layered over the default XDG paths)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON output
    Json,
    /// Plain text (one target per line)
    Plain,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Layer CLI flags over loaded configuration
    ///
    /// `--cwd` is written to `execution.working_dir`, which is the CLI tier
    /// of working-directory resolution.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(ref makefile) = self.makefile {
            config.makefile.path = makefile.clone();
        }
        if let Some(ref cwd) = self.cwd {
            config.execution.working_dir = Some(cwd.clone());
        }
        let include = non_blank(&self.include);
        if !include.is_empty() {
            config.discovery.include = include;
        }
        let exclude = non_blank(&self.exclude);
        if !exclude.is_empty() {
            config.discovery.exclude = exclude;
        }
        if let Some(ref prefix) = self.prefix {
            config.discovery.prefix = prefix.clone();
        }
        if let Some(timeout) = self.timeout {
            config.execution.timeout = timeout;
        }
        if self.all_targets {
            config.discovery.all_targets = true;
        }
        if let Some(ref command) = self.make_command {
            config.execution.command = command.clone();
        }
    }
}

fn non_blank(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
