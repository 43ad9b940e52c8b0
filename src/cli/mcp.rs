//! MCP server launcher
//!
//! Serves the MCP protocol over stdio. Logs go to stderr so stdout carries
//! only protocol messages.

use anyhow::Result;
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};

use crate::mcp::MakefileMcpServer;

/// Run the MCP server over stdio until the client disconnects.
pub async fn run_mcp_server(server: MakefileMcpServer) -> Result<()> {
    let transport = (stdin(), stdout());

    let service = server.serve(transport).await?;
    tracing::info!("MCP server ready on stdio");

    service.waiting().await?;

    Ok(())
}
