//! Include/exclude filtering of discovered targets
//!
//! Patterns use shell-style globs (`*`, `?`, `[abc]`) matched case-sensitively
//! against the whole target name. Exclusion always wins over inclusion.

use glob::Pattern;
use serde::Serialize;

use super::parser::TargetRecord;
use crate::error::TaskError;

/// Why a target was left out of the exposed set
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// An include list is set and the name matches none of it
    NotIncluded,
    /// The name matches an exclude pattern
    Excluded,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::NotIncluded => write!(f, "excluded by --include"),
            Rejection::Excluded => write!(f, "excluded by --exclude"),
        }
    }
}

/// Compiled include/exclude glob sets
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    include: Option<Vec<Pattern>>,
    exclude: Option<Vec<Pattern>>,
}

impl TargetFilter {
    /// Compile pattern lists; an empty list means "not set"
    ///
    /// # Errors
    /// * `TaskError::InvalidPattern` - A pattern is not a valid glob
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, TaskError> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Check a single name, reporting why it was rejected
    pub fn rejection(&self, name: &str) -> Option<Rejection> {
        if let Some(ref exclude) = self.exclude {
            if exclude.iter().any(|p| p.matches(name)) {
                return Some(Rejection::Excluded);
            }
        }
        if let Some(ref include) = self.include {
            if !include.iter().any(|p| p.matches(name)) {
                return Some(Rejection::NotIncluded);
            }
        }
        None
    }

    /// Whether a name passes both stages
    pub fn is_eligible(&self, name: &str) -> bool {
        self.rejection(name).is_none()
    }

    /// Keep eligible targets, preserving input order
    pub fn apply(&self, targets: &[TargetRecord]) -> Vec<TargetRecord> {
        targets
            .iter()
            .filter(|t| self.is_eligible(&t.name))
            .cloned()
            .collect()
    }
}

fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Option<Vec<Pattern>>, TaskError> {
    let compiled = patterns
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            Pattern::new(p).map_err(|e| TaskError::InvalidPattern {
                pattern: p.to_string(),
                error: e.msg.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(if compiled.is_empty() {
        None
    } else {
        Some(compiled)
    })
}
