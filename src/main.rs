//! makefile-mcp CLI entry point
//!
//! Usage:
//!   makefile-mcp [OPTIONS]          Serve Makefile targets as MCP tools over stdio
//!   makefile-mcp --list [OPTIONS]   Print discovered targets and exit

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use makefile_mcp::cli::{run_mcp_server, Cli, LogFormat, OutputFormat};
use makefile_mcp::config::{load_config, ResolvedSettings};
use makefile_mcp::makefile::{Catalog, Exposure, TargetFilter, FALLBACK_TOOL_ID};
use makefile_mcp::mcp::MakefileMcpServer;
use makefile_mcp::workdir::WorkingDirectoryState;

/// Column width for tool ids in the list table
const TOOL_ID_WIDTH: usize = 25;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; stdout carries the MCP stream
fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.list {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_to(&mut config);

    let workdir = WorkingDirectoryState::from_process(config.working_dir())
        .context("Failed to get current directory")?;
    let settings = config.resolve(workdir.static_dir())?;

    check_make_command(&settings.make_command);

    if cli.list {
        return list_targets(&settings, cli.format);
    }

    let server = MakefileMcpServer::new(settings, Arc::new(workdir))
        .context("Failed to discover Makefile targets")?;

    run_mcp_server(server).await
}

/// Warn early when make is not on PATH
fn check_make_command(make_command: &str) {
    let program = shlex::split(make_command)
        .and_then(|words| words.into_iter().next())
        .unwrap_or_else(|| make_command.to_string());

    if let Err(e) = which::which(&program) {
        tracing::warn!("'{}' not found on PATH ({}); target runs will fail", program, e);
    }
}

/// Print discovered targets
fn list_targets(settings: &ResolvedSettings, format: OutputFormat) -> Result<()> {
    let filter = TargetFilter::new(&settings.include, &settings.exclude)?;
    let catalog = Catalog::load(settings, &filter)?;
    let entries = catalog.entries();

    match format {
        OutputFormat::Json => {
            let tools: Vec<&str> = catalog.tools().iter().map(|t| t.tool_id.as_str()).collect();
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "makefile": catalog.makefile().display().to_string(),
                "targets": entries,
                "tools": tools,
            }))?;
            println!("{}", json);
        }
        OutputFormat::Plain => {
            for tool in catalog.tools().iter() {
                println!("{}", tool.tool_id);
            }
        }
        OutputFormat::Table => {
            println!("Discovered {} targets:", entries.len());
            for entry in &entries {
                let id = format!("{:<width$}", entry.tool_id, width = TOOL_ID_WIDTH);
                let desc = entry.description.as_deref().unwrap_or("");
                match entry.exposure {
                    Exposure::Exposed => println!("  {} {}", id.green(), desc),
                    ref other => println!(
                        "  {} {} {}",
                        id.dimmed(),
                        desc,
                        format!("[{}]", other).yellow()
                    ),
                }
            }
            println!();
            println!(
                "{}: {} (runs any target by name)",
                "Fallback".cyan(),
                FALLBACK_TOOL_ID
            );
        }
    }

    Ok(())
}
