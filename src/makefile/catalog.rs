//! Discovery catalog
//!
//! Runs read, parse, filter and synthesis as one step and keeps the results
//! together, so a refresh swaps the whole view at once.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::filter::{Rejection, TargetFilter};
use super::parser::{parse_makefile_str, read_makefile, TargetRecord};
use super::tools::{
    sanitize_tool_id, synthesize, SynthesisOptions, ToolSet, BUILTIN_TOOL_IDS, FALLBACK_TOOL_ID,
};
use crate::config::ResolvedSettings;
use crate::error::TaskError;

/// How a discovered target is reachable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Exposure {
    /// Has its own tool
    Exposed,
    /// Dropped by include/exclude
    Filtered { reason: Rejection },
    /// No `##` description and undocumented targets are hidden
    Undocumented,
    /// Its tool id belongs to a built-in tool
    Reserved,
    /// Its tool id was taken by a later target with the same sanitized id
    Shadowed { by: String },
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Exposed => write!(f, "exposed"),
            Exposure::Filtered { reason } => write!(f, "{}", reason),
            Exposure::Undocumented => write!(f, "undocumented"),
            Exposure::Reserved => write!(f, "shadowed by built-in tool"),
            Exposure::Shadowed { by } => write!(f, "tool id taken by '{}'", by),
        }
    }
}

/// One row of the catalog report
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    /// Tool id the target has, or would have if exposed
    pub tool_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    pub phony: bool,
    #[serde(flatten)]
    pub exposure: Exposure,
}

/// Snapshot of one discovery pass
#[derive(Debug, Clone)]
pub struct Catalog {
    makefile: PathBuf,
    source: String,
    targets: Vec<TargetRecord>,
    tools: ToolSet,
    filter: TargetFilter,
    prefix: String,
    all_targets: bool,
}

impl Catalog {
    /// Read the Makefile named in `settings` and build the tool set
    ///
    /// # Errors
    /// * `TaskError::FileNotFound` - The Makefile does not exist
    /// * `TaskError::PermissionDenied` - The Makefile cannot be read
    pub fn load(settings: &ResolvedSettings, filter: &TargetFilter) -> Result<Self, TaskError> {
        let source = read_makefile(&settings.makefile)?;
        let catalog = Self::from_source(
            &settings.makefile,
            source,
            filter,
            &settings.prefix,
            settings.all_targets,
        );

        tracing::info!("{}", catalog.summary_line());

        Ok(catalog)
    }

    /// Build a catalog from Makefile text already in memory
    pub fn from_source(
        makefile: &Path,
        source: String,
        filter: &TargetFilter,
        prefix: &str,
        all_targets: bool,
    ) -> Self {
        let targets = parse_makefile_str(&source);
        let eligible = filter.apply(&targets);
        let options = SynthesisOptions {
            prefix,
            include_undocumented: all_targets,
            reserved_ids: BUILTIN_TOOL_IDS,
        };
        let tools = synthesize(&eligible, &options);

        Self {
            makefile: makefile.to_path_buf(),
            source,
            targets,
            tools,
            filter: filter.clone(),
            prefix: prefix.to_string(),
            all_targets,
        }
    }

    /// Path the catalog was read from
    pub fn makefile(&self) -> &Path {
        &self.makefile
    }

    /// Raw Makefile text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every parsed target, in declaration order
    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    /// Exposed tools, fallback first
    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Look up a declared target, exposed or not
    pub fn find_target(&self, name: &str) -> Option<&TargetRecord> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Names of every declared target
    pub fn target_names(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }

    /// How `record` is reachable
    pub fn exposure(&self, record: &TargetRecord) -> Exposure {
        if self.tools.tool_for_target(&record.name).is_some() {
            return Exposure::Exposed;
        }
        if let Some(reason) = self.filter.rejection(&record.name) {
            return Exposure::Filtered { reason };
        }
        let tool_id = self.tool_id_for(&record.name);
        if BUILTIN_TOOL_IDS.contains(&tool_id.as_str()) {
            return Exposure::Reserved;
        }
        if record.description.is_some() || self.all_targets {
            if let Some(owner) = self.tools.get(&tool_id).and_then(|t| t.target()) {
                return Exposure::Shadowed {
                    by: owner.to_string(),
                };
            }
        }
        Exposure::Undocumented
    }

    fn tool_id_for(&self, name: &str) -> String {
        sanitize_tool_id(&self.prefix, name)
    }

    /// Report rows for every declared target
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.targets
            .iter()
            .map(|record| {
                let tool_id = match self.tools.tool_for_target(&record.name) {
                    Some(tool) => tool.tool_id.clone(),
                    None => self.tool_id_for(&record.name),
                };
                CatalogEntry {
                    name: record.name.clone(),
                    tool_id,
                    description: record.description.clone(),
                    prerequisites: record.prerequisites.clone(),
                    phony: record.phony,
                    exposure: self.exposure(record),
                }
            })
            .collect()
    }

    /// One-line count summary
    pub fn summary_line(&self) -> String {
        format!(
            "Discovered {} targets in {}, {} exposed as tools",
            self.targets.len(),
            self.makefile.display(),
            self.tools.target_tool_count()
        )
    }

    /// Markdown listing of every target and how to reach it
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str("# Makefile targets\n\n");
        out.push_str(&format!("Source: `{}`\n\n", self.makefile.display()));

        if self.targets.is_empty() {
            out.push_str("No targets found.\n");
            return out;
        }

        out.push_str("| Target | Tool | Description | Prerequisites | Status |\n");
        out.push_str("|---|---|---|---|---|\n");
        for entry in self.entries() {
            let tool = match entry.exposure {
                Exposure::Exposed => format!("`{}`", entry.tool_id),
                _ => "-".to_string(),
            };
            out.push_str(&format!(
                "| `{}` | {} | {} | {} | {} |\n",
                entry.name,
                tool,
                escape_cell(entry.description.as_deref().unwrap_or("")),
                escape_cell(&entry.prerequisites.join(" ")),
                entry.exposure
            ));
        }

        out.push_str(&format!(
            "\nAny target above can be run with the `{}` tool: `{{\"target\": \"<name>\"}}`.\n",
            FALLBACK_TOOL_ID
        ));
        out
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAKEFILE: &str = "\
.PHONY: test deploy clean

test: ## Run tests
\tcargo test

deploy: build ## Ship it | carefully
\t./deploy.sh

clean:
\trm -rf target
";

    fn catalog(filter: TargetFilter, all_targets: bool) -> Catalog {
        Catalog::from_source(
            Path::new("/p/Makefile"),
            MAKEFILE.to_string(),
            &filter,
            "make_",
            all_targets,
        )
    }

    #[test]
    fn test_catalog_exposes_documented_targets() {
        let catalog = catalog(TargetFilter::default(), false);

        let ids: Vec<&str> = catalog.tools().iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["make", "make_test", "make_deploy"]);
        assert_eq!(catalog.targets().len(), 3);
    }

    #[test]
    fn test_catalog_with_exclude() {
        let filter = TargetFilter::new(&[], &["deploy"]).unwrap();
        let catalog = catalog(filter, false);

        let ids: Vec<&str> = catalog.tools().iter().map(|t| t.tool_id.as_str()).collect();
        assert_eq!(ids, vec!["make", "make_test"]);
        // Still declared, so the fallback can run it
        assert!(catalog.find_target("deploy").is_some());
    }

    #[test]
    fn test_exposure_statuses() {
        let filter = TargetFilter::new(&[], &["deploy"]).unwrap();
        let catalog = catalog(filter, false);

        let entries = catalog.entries();
        assert_eq!(entries[0].exposure, Exposure::Exposed);
        assert_eq!(entries[0].tool_id, "make_test");
        assert_eq!(
            entries[1].exposure,
            Exposure::Filtered {
                reason: Rejection::Excluded
            }
        );
        assert_eq!(entries[1].tool_id, "make_deploy");
        assert_eq!(entries[2].exposure, Exposure::Undocumented);
        assert!(entries[2].phony);
    }

    #[test]
    fn test_colliding_ids_mark_earlier_target_shadowed() {
        let catalog = Catalog::from_source(
            Path::new("Makefile"),
            "a.b: ## First\n\t@echo a\na/b: ## Second\n\t@echo b\n".to_string(),
            &TargetFilter::default(),
            "make_",
            false,
        );

        let entries = catalog.entries();
        assert_eq!(entries[0].name, "a.b");
        assert_eq!(entries[0].tool_id, "make_a_b");
        assert_eq!(
            entries[0].exposure,
            Exposure::Shadowed {
                by: "a/b".to_string()
            }
        );
        assert_eq!(entries[1].exposure, Exposure::Exposed);

        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["status"], "shadowed");
        assert_eq!(json[0]["by"], "a/b");
        assert!(catalog.render_summary().contains("tool id taken by 'a/b'"));
    }

    #[test]
    fn test_undocumented_collision_stays_undocumented() {
        let catalog = Catalog::from_source(
            Path::new("Makefile"),
            "a.b:\n\t@echo a\na/b: ## Second\n\t@echo b\n".to_string(),
            &TargetFilter::default(),
            "make_",
            false,
        );

        assert_eq!(catalog.entries()[0].exposure, Exposure::Undocumented);
    }

    #[test]
    fn test_all_targets_exposes_undocumented() {
        let catalog = catalog(TargetFilter::default(), true);

        assert!(catalog.tools().get("make_clean").is_some());
        assert_eq!(catalog.tools().target_tool_count(), 3);
    }

    #[test]
    fn test_render_summary() {
        let catalog = catalog(TargetFilter::default(), false);
        let summary = catalog.render_summary();

        assert!(summary.starts_with("# Makefile targets"));
        assert!(summary.contains("| `test` | `make_test` | Run tests |"));
        assert!(summary.contains("Ship it \\| carefully"));
        assert!(summary.contains("undocumented"));
        assert!(summary.contains("`make` tool"));
    }

    #[test]
    fn test_render_summary_empty() {
        let catalog = Catalog::from_source(
            Path::new("Makefile"),
            String::new(),
            &TargetFilter::default(),
            "make_",
            false,
        );

        assert!(catalog.render_summary().contains("No targets found."));
        assert_eq!(catalog.tools().len(), 1);
    }

    #[test]
    fn test_entry_serialization() {
        let catalog = catalog(TargetFilter::default(), false);
        let json = serde_json::to_value(catalog.entries()).unwrap();

        assert_eq!(json[0]["status"], "exposed");
        assert_eq!(json[0]["tool_id"], "make_test");
        assert_eq!(json[2]["status"], "undocumented");
    }

    #[test]
    fn test_load_missing_makefile() {
        let settings = crate::config::Config::default()
            .resolve(Path::new("/definitely/not/here"))
            .unwrap();

        let result = Catalog::load(&settings, &TargetFilter::default());
        assert!(matches!(result, Err(TaskError::FileNotFound { .. })));
    }
}
