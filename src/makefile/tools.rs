//! Tool synthesis from eligible targets
//!
//! Every eligible target becomes one MCP tool named `prefix + name`, with the
//! same two optional parameters (`args`, `dry_run`). A single fallback tool,
//! `make`, is always present so that filtered-out or undocumented targets stay
//! reachable by name.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::parser::TargetRecord;

/// Tool id of the fallback tool
pub const FALLBACK_TOOL_ID: &str = "make";

/// Tool id of the working-directory tool
pub const WORKDIR_TOOL_ID: &str = "set_working_directory";

/// Tool id of the rediscovery tool
pub const REFRESH_TOOL_ID: &str = "refresh_targets";

/// Ids no target tool may take
pub const BUILTIN_TOOL_IDS: &[&str] = &[FALLBACK_TOOL_ID, WORKDIR_TOOL_ID, REFRESH_TOOL_ID];

/// Default prefix for target tool ids
pub const DEFAULT_PREFIX: &str = "make_";

const FALLBACK_DESCRIPTION: &str =
    "Run any make target by name (use for targets not in the auto-discovered list)";

/// JSON object type used for tool input schemas
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Parameters accepted by every target-backed tool
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct TargetToolParams {
    /// Additional arguments passed to make, split like shell words
    #[serde(default)]
    pub args: Option<String>,

    /// Print commands without executing them (make -n)
    #[serde(default)]
    pub dry_run: Option<bool>,
}

/// Parameters accepted by the fallback `make` tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FallbackToolParams {
    /// Make target to run
    pub target: String,

    /// Additional arguments passed to make, split like shell words
    #[serde(default)]
    pub args: Option<String>,

    /// Print commands without executing them (make -n)
    #[serde(default)]
    pub dry_run: Option<bool>,
}

static TARGET_SCHEMA: Lazy<Arc<JsonObject>> = Lazy::new(|| schema_of::<TargetToolParams>());
static FALLBACK_SCHEMA: Lazy<Arc<JsonObject>> = Lazy::new(|| schema_of::<FallbackToolParams>());

/// Render a parameter type's JSON schema as a shared object
pub fn schema_of<T: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(serde_json::Value::Object(map)) => Arc::new(map),
        _ => Arc::new(JsonObject::new()),
    }
}

/// What a tool does when called
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolKind {
    /// Runs one fixed target
    Target { target: String },
    /// Runs any target named in the call
    Fallback,
}

/// One tool advertised to the client
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub tool_id: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: ToolKind,
    #[serde(skip)]
    pub schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    /// Descriptor for a target-backed tool
    pub fn for_target(record: &TargetRecord, prefix: &str) -> Self {
        Self {
            tool_id: sanitize_tool_id(prefix, &record.name),
            description: record
                .description
                .clone()
                .unwrap_or_else(|| format!("Run make target '{}'", record.name)),
            kind: ToolKind::Target {
                target: record.name.clone(),
            },
            schema: TARGET_SCHEMA.clone(),
        }
    }

    /// The fallback `make` descriptor
    pub fn fallback() -> Self {
        Self {
            tool_id: FALLBACK_TOOL_ID.to_string(),
            description: FALLBACK_DESCRIPTION.to_string(),
            kind: ToolKind::Fallback,
            schema: FALLBACK_SCHEMA.clone(),
        }
    }

    /// Target name for target-backed tools
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            ToolKind::Target { target } => Some(target),
            ToolKind::Fallback => None,
        }
    }
}

/// Build a transport-safe tool id
///
/// Characters outside `[A-Za-z0-9_-]` become `_`. The mapping is a pure
/// function of its inputs.
pub fn sanitize_tool_id(prefix: &str, name: &str) -> String {
    prefix
        .chars()
        .chain(name.chars())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Options controlling synthesis
#[derive(Debug, Clone)]
pub struct SynthesisOptions<'a> {
    /// Prefix prepended to every target tool id
    pub prefix: &'a str,
    /// Expose targets without a `##` description
    pub include_undocumented: bool,
    /// Ids owned by built-in tools; targets mapping to them are skipped
    pub reserved_ids: &'a [&'a str],
}

impl Default for SynthesisOptions<'_> {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX,
            include_undocumented: false,
            reserved_ids: BUILTIN_TOOL_IDS,
        }
    }
}

/// Ordered, id-unique set of tool descriptors
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Insert a descriptor; an existing id is replaced in place
    fn upsert(&mut self, tool: ToolDescriptor) {
        match self.index.get(&tool.tool_id) {
            Some(&idx) => {
                tracing::debug!(
                    "Tool id '{}' redefined, later target wins",
                    tool.tool_id
                );
                self.tools[idx] = tool;
            }
            None => {
                self.index.insert(tool.tool_id.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Look up a tool by id
    pub fn get(&self, tool_id: &str) -> Option<&ToolDescriptor> {
        self.index.get(tool_id).map(|&idx| &self.tools[idx])
    }

    /// All descriptors, fallback first
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Number of tools including the fallback
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Never true once synthesized, the fallback is always present
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Number of target-backed tools
    pub fn target_tool_count(&self) -> usize {
        self.tools.iter().filter(|t| t.target().is_some()).count()
    }

    /// Tool id exposing `target`, if it has a dedicated tool
    pub fn tool_for_target(&self, target: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.target() == Some(target))
    }
}

/// Map eligible targets to tools and add the fallback
pub fn synthesize(eligible: &[TargetRecord], options: &SynthesisOptions<'_>) -> ToolSet {
    let mut set = ToolSet::default();
    set.upsert(ToolDescriptor::fallback());

    for record in eligible {
        if record.description.is_none() && !options.include_undocumented {
            continue;
        }

        let tool = ToolDescriptor::for_target(record, options.prefix);
        if options.reserved_ids.contains(&tool.tool_id.as_str()) {
            tracing::warn!(
                "Target '{}' maps to reserved tool id '{}', reachable only via '{}'",
                record.name,
                tool.tool_id,
                FALLBACK_TOOL_ID
            );
            continue;
        }

        set.upsert(tool);
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documented(name: &str, desc: &str) -> TargetRecord {
        TargetRecord {
            description: Some(desc.to_string()),
            ..TargetRecord::new(name)
        }
    }

    #[test]
    fn test_sanitize_tool_id() {
        assert_eq!(sanitize_tool_id("make_", "test"), "make_test");
        assert_eq!(sanitize_tool_id("make_", "build-prod"), "make_build-prod");
        assert_eq!(sanitize_tool_id("make_", "docs/html"), "make_docs_html");
        assert_eq!(sanitize_tool_id("make_", "out.txt"), "make_out_txt");
        assert_eq!(sanitize_tool_id("mk.", "a+b"), "mk_a_b");
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let first = sanitize_tool_id("make_", "weird.name/x");
        let second = sanitize_tool_id("make_", "weird.name/x");
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_always_present() {
        let set = synthesize(&[], &SynthesisOptions::default());

        assert_eq!(set.len(), 1);
        let fallback = set.get(FALLBACK_TOOL_ID).unwrap();
        assert_eq!(fallback.kind, ToolKind::Fallback);
    }

    #[test]
    fn test_target_tools_after_fallback() {
        let targets = vec![documented("test", "Run tests"), documented("lint", "Lint")];
        let set = synthesize(&targets, &SynthesisOptions::default());

        let ids: Vec<&str> = set.iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["make", "make_test", "make_lint"]);
        assert_eq!(set.get("make_test").unwrap().description, "Run tests");
        assert_eq!(set.get("make_test").unwrap().target(), Some("test"));
        assert_eq!(set.target_tool_count(), 2);
    }

    #[test]
    fn test_undocumented_targets_skipped_by_default() {
        let targets = vec![TargetRecord::new("clean"), documented("build", "Build")];
        let set = synthesize(&targets, &SynthesisOptions::default());

        assert!(set.get("make_clean").is_none());
        assert!(set.get("make_build").is_some());
    }

    #[test]
    fn test_undocumented_targets_get_generic_description() {
        let targets = vec![TargetRecord::new("clean")];
        let options = SynthesisOptions {
            include_undocumented: true,
            ..Default::default()
        };
        let set = synthesize(&targets, &options);

        assert_eq!(
            set.get("make_clean").unwrap().description,
            "Run make target 'clean'"
        );
    }

    #[test]
    fn test_custom_prefix() {
        let targets = vec![documented("test", "Run tests")];
        let options = SynthesisOptions {
            prefix: "proj_",
            ..Default::default()
        };
        let set = synthesize(&targets, &options);

        assert!(set.get("proj_test").is_some());
        assert!(set.get("make_test").is_none());
    }

    #[test]
    fn test_collision_later_target_wins() {
        // Both sanitize to make_a_b
        let targets = vec![documented("a.b", "First"), documented("a/b", "Second")];
        let set = synthesize(&targets, &SynthesisOptions::default());

        assert_eq!(set.len(), 2);
        let tool = set.get("make_a_b").unwrap();
        assert_eq!(tool.description, "Second");
        assert_eq!(tool.target(), Some("a/b"));
    }

    #[test]
    fn test_reserved_id_is_skipped() {
        let targets = vec![documented("make", "Shadow the fallback")];
        let options = SynthesisOptions {
            prefix: "",
            ..Default::default()
        };
        let set = synthesize(&targets, &options);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("make").unwrap().kind, ToolKind::Fallback);
    }

    #[test]
    fn test_builtin_ids_are_reserved() {
        let targets = vec![documented("refresh_targets", "Shadow"), documented("ok", "Fine")];
        let options = SynthesisOptions {
            prefix: "",
            ..Default::default()
        };
        let set = synthesize(&targets, &options);

        assert!(set.get(REFRESH_TOOL_ID).is_none());
        assert!(set.get("ok").is_some());
    }

    #[test]
    fn test_target_schema_shape() {
        let tool = ToolDescriptor::for_target(&documented("test", "Run tests"), "make_");
        let props = tool.schema["properties"].as_object().unwrap();

        assert!(props.contains_key("args"));
        assert!(props.contains_key("dry_run"));
        assert_eq!(props.len(), 2);
        assert!(tool.schema.get("required").map_or(true, |r| r
            .as_array()
            .unwrap()
            .is_empty()));
    }

    #[test]
    fn test_fallback_schema_requires_target() {
        let tool = ToolDescriptor::fallback();
        let required = tool.schema["required"].as_array().unwrap();

        assert_eq!(required, &vec![serde_json::json!("target")]);
        assert!(tool.schema["properties"]["args"].is_object());
        assert!(tool.schema["properties"]["dry_run"].is_object());
    }

    #[test]
    fn test_schema_is_stable_across_synthesis() {
        let targets = vec![documented("test", "Run tests")];
        let a = synthesize(&targets, &SynthesisOptions::default());
        let b = synthesize(&targets, &SynthesisOptions::default());

        assert_eq!(
            a.get("make_test").unwrap().schema,
            b.get("make_test").unwrap().schema
        );
    }

    #[test]
    fn test_target_params_deserialize_defaults() {
        let params: TargetToolParams = serde_json::from_str("{}").unwrap();
        assert!(params.args.is_none());
        assert!(params.dry_run.is_none());

        let params: FallbackToolParams =
            serde_json::from_str(r#"{"target": "deploy", "dry_run": true}"#).unwrap();
        assert_eq!(params.target, "deploy");
        assert_eq!(params.dry_run, Some(true));
    }

    #[test]
    fn test_descriptor_serialization() {
        let tool = ToolDescriptor::for_target(&documented("test", "Run tests"), "make_");
        let json = serde_json::to_value(&tool).unwrap();

        assert_eq!(json["tool_id"], "make_test");
        assert_eq!(json["kind"], "target");
        assert_eq!(json["target"], "test");
    }
}
