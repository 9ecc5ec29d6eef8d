//! Workflow loading error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::validator::GraphIssue;

/// Malformed workflow document.
///
/// `path` is a dotted location inside the document (`phases.plan.outputState`,
/// `states[2].name`) or `(root)` for syntax errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ConfigParseError {
    /// Location of the offending value
    pub path: String,

    /// What is wrong with it
    pub message: String,
}

impl ConfigParseError {
    /// Create a parse error at the given path.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }

    /// Create a parse error for the whole document.
    pub fn root(message: impl Into<String>) -> Self {
        Self::new("(root)", message)
    }
}

/// Structural problems found by the graph validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct GraphValidationError {
    /// Every issue found, in validator order
    pub issues: Vec<GraphIssue>,
}

impl fmt::Display for GraphValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "workflow graph has {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

/// Errors that stop the engine before any phase runs.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Workflow file could not be read.
    #[error("failed to read workflow file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Workflow document is malformed.
    #[error("invalid workflow document: {0}")]
    Parse(#[from] ConfigParseError),

    /// Workflow graph failed structural validation.
    #[error(transparent)]
    Graph(#[from] GraphValidationError),
}

/// Result type for workflow loading.
pub type LoadResult<T> = Result<T, LoadError>;
