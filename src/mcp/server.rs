//! MCP Server implementation
//!
//! Exposes the discovered Makefile targets as MCP tools using the rmcp SDK.
//! Tools are built at runtime from the catalog, so `list_tools` and
//! `call_tool` are implemented by hand instead of through the tool macros.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rmcp::model::{
    AnnotateAble, CallToolRequestParam, CallToolResult, Content, Implementation,
    ListResourcesResult, ListToolsResult, PaginatedRequestParam, RawResource,
    ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
    ResourcesCapability, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{Error as McpError, RoleServer, ServerHandler};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::ResolvedSettings;
use crate::error::{suggest_fix, ErrorInfo, TaskError};
use crate::executor::{build_make_argv, exec_command, ExecOptions, ExecutionResult};
use crate::makefile::tools::{schema_of, JsonObject};
use crate::makefile::{
    Catalog, FallbackToolParams, TargetFilter, TargetToolParams, ToolKind, REFRESH_TOOL_ID,
    WORKDIR_TOOL_ID,
};
use crate::workdir::WorkingDirectoryState;

/// URI of the raw Makefile resource
pub const RAW_RESOURCE_URI: &str = "makefile://raw";

/// URI of the target summary resource
pub const TARGETS_RESOURCE_URI: &str = "makefile://targets";

const WORKDIR_DESCRIPTION: &str = "Set the directory make runs in. Pass null or an empty \
     string to clear the override and fall back to --cwd, MAKEFILE_MCP_CWD or the startup directory.";

const REFRESH_DESCRIPTION: &str =
    "Re-read the Makefile and rebuild the tool list after targets were added or removed.";

/// Parameters for set_working_directory tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct SetWorkingDirectoryParams {
    /// New working directory, or null to clear the override
    #[serde(default)]
    pub path: Option<String>,
}

/// Parameters for refresh_targets tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct RefreshTargetsParams {}

static WORKDIR_SCHEMA: Lazy<Arc<JsonObject>> = Lazy::new(schema_of::<SetWorkingDirectoryParams>);
static REFRESH_SCHEMA: Lazy<Arc<JsonObject>> = Lazy::new(schema_of::<RefreshTargetsParams>);

/// Response from a target run
#[derive(Debug, Serialize)]
pub struct RunTargetResponse {
    /// Whether make exited with status 0 in time
    pub success: bool,
    /// Target that was run
    pub target: String,
    /// Full command that was executed
    pub command_executed: String,
    /// Directory make ran in
    pub working_dir: String,
    /// Whether `-n` was passed
    pub dry_run: bool,
    /// Exit code, absent when the process was killed
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stdout_truncated: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stderr_truncated: bool,
    pub timed_out: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Error information if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl RunTargetResponse {
    fn new(
        target: String,
        working_dir: &std::path::Path,
        dry_run: bool,
        result: ExecutionResult,
        timeout_secs: u64,
    ) -> Self {
        let success = result.success();
        let error = if result.timed_out {
            Some(ErrorInfo {
                message: format!("Command timed out after {}s", timeout_secs),
                error_type: "timeout".to_string(),
                suggestion: Some("Raise --timeout or run a narrower target".to_string()),
                exit_code: None,
                stderr: None,
                available: vec![],
            })
        } else if !success {
            Some(ErrorInfo {
                message: match result.exit_code {
                    Some(code) => format!("Command failed with exit code {}", code),
                    None => "Command was terminated by a signal".to_string(),
                },
                error_type: "command_failed".to_string(),
                suggestion: suggest_fix(&result.command, &result.stderr),
                exit_code: result.exit_code,
                stderr: None,
                available: vec![],
            })
        } else {
            None
        };

        Self {
            success,
            target,
            command_executed: result.command,
            working_dir: working_dir.display().to_string(),
            dry_run,
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            stdout_truncated: result.stdout_truncated,
            stderr_truncated: result.stderr_truncated,
            timed_out: result.timed_out,
            duration_ms: result.duration_ms,
            error,
        }
    }
}

/// Error response for tools
#[derive(Debug, Serialize)]
struct ToolError {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    error: ErrorInfo,
}

impl ToolError {
    fn new(err: &TaskError, target: Option<&str>) -> String {
        serde_json::to_string_pretty(&ToolError {
            success: false,
            target: target.map(str::to_string),
            error: ErrorInfo::from(err),
        })
        .unwrap_or_else(|_| format!("{{\"success\":false,\"error\":\"{}\"}}", err))
    }
}

/// Text and error flag of a finished tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

impl From<ToolOutcome> for CallToolResult {
    fn from(outcome: ToolOutcome) -> Self {
        let content = vec![Content::text(outcome.text)];
        if outcome.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

/// MCP Server exposing Makefile targets as tools
#[derive(Clone)]
pub struct MakefileMcpServer {
    settings: Arc<ResolvedSettings>,
    filter: Arc<TargetFilter>,
    workdir: Arc<WorkingDirectoryState>,
    catalog: Arc<RwLock<Catalog>>,
}

impl MakefileMcpServer {
    /// Compile filters and run the first discovery pass
    ///
    /// # Errors
    /// * `TaskError::InvalidPattern` - An include/exclude glob is invalid
    /// * `TaskError::FileNotFound` - The Makefile does not exist
    pub fn new(
        settings: ResolvedSettings,
        workdir: Arc<WorkingDirectoryState>,
    ) -> Result<Self, TaskError> {
        let filter = TargetFilter::new(&settings.include, &settings.exclude)?;
        let catalog = Catalog::load(&settings, &filter)?;
        Ok(Self::with_catalog(settings, filter, workdir, catalog))
    }

    /// Create from an already built catalog
    pub fn with_catalog(
        settings: ResolvedSettings,
        filter: TargetFilter,
        workdir: Arc<WorkingDirectoryState>,
        catalog: Catalog,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            filter: Arc::new(filter),
            workdir,
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Re-read the Makefile; the old catalog stays if reading fails
    pub async fn refresh(&self) -> Result<String, TaskError> {
        let fresh = Catalog::load(&self.settings, &self.filter)?;
        let summary = fresh.summary_line();
        *self.catalog.write().await = fresh;
        Ok(summary)
    }

    /// Tools currently advertised, fallback first and built-ins last
    pub async fn tools(&self) -> Vec<Tool> {
        let catalog = self.catalog.read().await;
        let mut tools: Vec<Tool> = catalog
            .tools()
            .iter()
            .map(|d| Tool::new(d.tool_id.clone(), d.description.clone(), d.schema.clone()))
            .collect();

        tools.push(Tool::new(
            WORKDIR_TOOL_ID,
            WORKDIR_DESCRIPTION,
            WORKDIR_SCHEMA.clone(),
        ));
        tools.push(Tool::new(
            REFRESH_TOOL_ID,
            REFRESH_DESCRIPTION,
            REFRESH_SCHEMA.clone(),
        ));
        tools
    }

    /// Route a tool call by name
    ///
    /// Unknown tools and malformed parameters are protocol errors; everything
    /// that goes wrong while running make is reported in the outcome.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolOutcome, McpError> {
        match name {
            WORKDIR_TOOL_ID => {
                let params: SetWorkingDirectoryParams = parse_params(name, arguments)?;
                return Ok(self.set_working_directory(params));
            }
            REFRESH_TOOL_ID => {
                let _: RefreshTargetsParams = parse_params(name, arguments)?;
                return Ok(self.refresh_targets().await);
            }
            _ => {}
        }

        let kind = {
            let catalog = self.catalog.read().await;
            catalog.tools().get(name).map(|d| d.kind.clone())
        };

        match kind {
            Some(ToolKind::Target { target }) => {
                let params: TargetToolParams = parse_params(name, arguments)?;
                Ok(self
                    .run_target(target, params.args, params.dry_run.unwrap_or(false), false)
                    .await)
            }
            Some(ToolKind::Fallback) => {
                let params: FallbackToolParams = parse_params(name, arguments)?;
                Ok(self
                    .run_target(
                        params.target,
                        params.args,
                        params.dry_run.unwrap_or(false),
                        true,
                    )
                    .await)
            }
            None => Err(McpError::invalid_params(
                format!("Unknown tool '{}'", name),
                None,
            )),
        }
    }

    fn set_working_directory(&self, params: SetWorkingDirectoryParams) -> ToolOutcome {
        let cleared = params
            .path
            .as_deref()
            .map_or(true, |p| p.trim().is_empty());
        let effective = self.workdir.set_override(params.path.as_deref());

        let mut text = if cleared {
            format!(
                "Working directory override cleared. Using {}",
                effective.display()
            )
        } else {
            format!("Working directory set to {}", effective.display())
        };
        if !effective.is_dir() {
            text.push_str(" (warning: not an existing directory, runs will fail until it is)");
        }
        ToolOutcome::ok(text)
    }

    async fn refresh_targets(&self) -> ToolOutcome {
        match self.refresh().await {
            Ok(summary) => ToolOutcome::ok(summary),
            Err(e) => {
                tracing::warn!("Refresh failed: {}", e);
                ToolOutcome::error(ToolError::new(&e, None))
            }
        }
    }

    /// Resolve, build the argument vector and run make
    async fn run_target(
        &self,
        target: String,
        args: Option<String>,
        dry_run: bool,
        check_declared: bool,
    ) -> ToolOutcome {
        let makefile = {
            let catalog = self.catalog.read().await;
            if check_declared && catalog.find_target(&target).is_none() {
                let err = TaskError::UnknownTarget {
                    target: target.clone(),
                    available: catalog.target_names(),
                };
                return ToolOutcome::error(ToolError::new(&err, Some(&target)));
            }
            catalog.makefile().to_path_buf()
        };

        let working_dir = match self.workdir.resolve_validated() {
            Ok(dir) => dir,
            Err(e) => return ToolOutcome::error(ToolError::new(&e, Some(&target))),
        };

        let argv = match build_make_argv(
            &self.settings.make_command,
            &makefile,
            &target,
            args.as_deref(),
            dry_run,
        ) {
            Ok(argv) => argv,
            Err(e) => return ToolOutcome::error(ToolError::new(&e, Some(&target))),
        };

        tracing::debug!("Running target '{}' in {}: {:?}", target, working_dir.display(), argv);

        let options = ExecOptions::in_dir(&working_dir)
            .with_timeout(self.settings.timeout)
            .with_max_output(self.settings.max_output_size);

        let result = match exec_command(&argv, &options).await {
            Ok(result) => result,
            Err(e) => return ToolOutcome::error(ToolError::new(&e, Some(&target))),
        };

        if result.timed_out {
            tracing::warn!("Target '{}' timed out", target);
        }

        let response = RunTargetResponse::new(
            target,
            &working_dir,
            dry_run,
            result,
            self.settings.timeout.as_secs(),
        );
        let is_error = !response.success;

        let text = serde_json::to_string_pretty(&response).unwrap_or_else(|e| {
            ToolError::new(&TaskError::Io(std::io::Error::other(e.to_string())), None)
        });

        ToolOutcome { text, is_error }
    }

    /// Resource descriptors
    pub fn resources(&self) -> Vec<Resource> {
        let mut raw = RawResource::new(RAW_RESOURCE_URI, "Makefile");
        raw.description = Some("Raw contents of the Makefile".to_string());
        raw.mime_type = Some("text/plain".to_string());

        let mut targets = RawResource::new(TARGETS_RESOURCE_URI, "Makefile targets");
        targets.description =
            Some("Every discovered target with its tool id and exposure status".to_string());
        targets.mime_type = Some("text/markdown".to_string());

        vec![raw.no_annotation(), targets.no_annotation()]
    }

    /// Render a resource from the current catalog
    pub async fn resource_text(&self, uri: &str) -> Result<String, McpError> {
        let catalog = self.catalog.read().await;
        match uri {
            RAW_RESOURCE_URI => Ok(catalog.source().to_string()),
            TARGETS_RESOURCE_URI => Ok(catalog.render_summary()),
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource '{}'", uri),
                Some(serde_json::json!({ "uri": uri })),
            )),
        }
    }
}

fn parse_params<T: DeserializeOwned>(
    tool: &str,
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = serde_json::Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(value).map_err(|e| {
        McpError::invalid_params(format!("Invalid parameters for '{}': {}", tool, e), None)
    })
}

impl ServerHandler for MakefileMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(true),
                }),
                resources: Some(ResourcesCapability {
                    subscribe: Some(false),
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            server_info: Implementation {
                name: "makefile-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Runs Makefile targets. Each documented target is a tool; the `make` tool \
                 runs any declared target by name. Read makefile://targets for the full list."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: PaginatedRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tools().await,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.dispatch(&request.name, request.arguments).await?;

        if request.name == REFRESH_TOOL_ID && !outcome.is_error {
            if let Err(e) = context.peer.notify_tool_list_changed().await {
                tracing::debug!("Could not send tool list change: {}", e);
            }
        }

        Ok(outcome.into())
    }

    async fn list_resources(
        &self,
        _request: PaginatedRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.resources(),
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.resource_text(&uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}
