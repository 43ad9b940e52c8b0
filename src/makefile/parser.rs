//! Makefile target parser
//!
//! Scans declaration lines of a Makefile and extracts:
//!
//! - target names (one or more per line, `build test: deps`)
//! - prerequisite lists
//! - an inline `##` documentation comment, used as the tool description
//!
//! The parser never evaluates variables or recipes. Anything it does not
//! recognise is skipped, so a partially malformed Makefile still yields every
//! target it can identify.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::TaskError;

/// Marker that turns a trailing comment into a tool description
pub const DOC_MARKER: &str = "##";

/// Valid target name: no leading dot, no variable or pattern characters
static TARGET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.+/-]*$").unwrap());

/// Target-specific variable after the colon: `deploy: ENV ?= prod`
static TARGET_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?:override|export|private)\s+)*[A-Za-z_][A-Za-z0-9_.-]*\s*(?:[?+!]|::?)?=")
        .unwrap()
});

/// A target declared in a Makefile
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TargetRecord {
    /// Target name as written in the Makefile
    pub name: String,
    /// Prerequisites from the declaration line (informational only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prerequisites: Vec<String>,
    /// Text of the `##` comment, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the target is listed in a `.PHONY` declaration
    pub phony: bool,
}

impl TargetRecord {
    /// Create an undocumented record with no prerequisites
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prerequisites: vec![],
            description: None,
            phony: false,
        }
    }
}

/// Read a Makefile from disk and parse it
///
/// # Errors
/// * `TaskError::FileNotFound` - The path does not exist
/// * `TaskError::PermissionDenied` - The file cannot be opened
pub fn parse_makefile(path: &Path) -> Result<Vec<TargetRecord>, TaskError> {
    let content = read_makefile(path)?;
    Ok(parse_makefile_str(&content))
}

/// Read the raw Makefile text
pub fn read_makefile(path: &Path) -> Result<String, TaskError> {
    std::fs::read_to_string(path).map_err(|e| TaskError::from_makefile_io(path, e))
}

/// Parse Makefile text into target records, in declaration order
///
/// A name declared more than once keeps the position of its first
/// declaration and the prerequisites and description of its last one.
pub fn parse_makefile_str(content: &str) -> Vec<TargetRecord> {
    let mut records: Vec<TargetRecord> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut phony: HashSet<String> = HashSet::new();

    for line in logical_lines(content) {
        let Some(decl) = parse_declaration(&line) else {
            continue;
        };

        if decl.names.iter().any(|n| n == ".PHONY") {
            phony.extend(decl.prerequisites.iter().cloned());
            continue;
        }

        for name in decl.names {
            if name.starts_with('.') {
                continue;
            }

            let record = TargetRecord {
                prerequisites: decl.prerequisites.clone(),
                description: decl.description.clone(),
                ..TargetRecord::new(name.clone())
            };

            match positions.get(&name) {
                Some(&idx) => records[idx] = record,
                None => {
                    positions.insert(name, records.len());
                    records.push(record);
                }
            }
        }
    }

    for record in &mut records {
        record.phony = phony.contains(&record.name);
    }

    records
}

/// One declaration line, split into its parts
#[derive(Debug, PartialEq)]
struct Declaration {
    names: Vec<String>,
    prerequisites: Vec<String>,
    description: Option<String>,
}

/// Parse a single logical line; `None` for anything that is not a rule
fn parse_declaration(line: &str) -> Option<Declaration> {
    let colon = line.find(':')?;
    let (lhs, rest) = (&line[..colon], &line[colon + 1..]);

    // `VAR = a:b` and friends
    if lhs.contains('=') || lhs.contains('#') {
        return None;
    }

    // `VAR := x`, `VAR ::= x`, otherwise `name::` is a double-colon rule
    let rest = match rest.strip_prefix(':') {
        Some(r) if r.starts_with('=') => return None,
        Some(r) => r,
        None if rest.starts_with('=') => return None,
        None => rest,
    };

    let names: Vec<String> = lhs.split_whitespace().map(str::to_string).collect();
    if names.is_empty() {
        return None;
    }
    let special = names.iter().all(|n| n.starts_with('.'));
    if !special && !names.iter().all(|n| TARGET_NAME_RE.is_match(n)) {
        tracing::debug!("Skipping unsupported declaration: {}", line);
        return None;
    }

    // Inline recipe (`target: deps ; cmd`) ends the prerequisite list
    let comment_at = rest.find('#');
    let recipe_at = rest.find(';');
    let (prereq_part, comment) = match (comment_at, recipe_at) {
        (Some(c), Some(r)) if r < c => (&rest[..r], None),
        (Some(c), _) => (&rest[..c], Some(&rest[c..])),
        (None, Some(r)) => (&rest[..r], None),
        (None, None) => (rest, None),
    };

    if TARGET_VAR_RE.is_match(prereq_part) {
        return None;
    }

    let prerequisites = prereq_part
        .split_whitespace()
        .filter(|p| *p != "|")
        .map(str::to_string)
        .collect();

    let description = comment
        .and_then(|c| c.strip_prefix(DOC_MARKER))
        .map(|d| d.trim_start_matches('#').trim().to_string())
        .filter(|d| !d.is_empty());

    Some(Declaration {
        names,
        prerequisites,
        description,
    })
}

/// Yield lines that can hold a declaration
///
/// Recipe lines, full-line comments and `define` blocks are dropped, and
/// backslash continuations are joined. A dropped line that ends in `\`
/// drops its continuation lines too.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending = String::new();
    let mut in_define = false;
    let mut skip_continuation = false;

    for raw in content.lines() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        if skip_continuation {
            skip_continuation = raw.ends_with('\\');
            continue;
        }

        if pending.is_empty() {
            let trimmed = raw.trim_start();
            let directive = trimmed.split_whitespace().next().unwrap_or("");

            if in_define {
                if directive == "endef" {
                    in_define = false;
                }
                continue;
            }
            if matches!(directive, "define" | "override" | "export" | "private")
                && trimmed.split_whitespace().any(|w| w == "define")
            {
                in_define = true;
                continue;
            }
            if raw.starts_with(char::is_whitespace) || trimmed.starts_with('#') {
                skip_continuation = raw.ends_with('\\');
                continue;
            }
        }

        match raw.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head);
                pending.push(' ');
            }
            None => {
                pending.push_str(raw);
                lines.push(std::mem::take(&mut pending));
            }
        }
    }

    if !pending.is_empty() {
        lines.push(pending);
    }

    lines
}
