//! Rule predicates.
//!
//! A predicate looks at a [`PolicyContext`] and reports pass or fail. Errors
//! (unreadable directory, command that cannot start or times out) are
//! returned as [`PredicateError`]; the engine records them as `error` entries.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use super::context::PolicyContext;
use crate::core::executor::{ExecError, Executor};

/// Outcome of a predicate that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub passed: bool,

    /// What was found (or missing)
    pub detail: String,
}

impl CheckOutcome {
    pub fn pass(detail: impl Into<String>) -> Self {
        Self { passed: true, detail: detail.into() }
    }

    pub fn fail(detail: impl Into<String>) -> Self {
        Self { passed: false, detail: detail.into() }
    }
}

/// A predicate that could not reach a verdict.
#[derive(Debug, Error)]
pub enum PredicateError {
    /// Filesystem access failed.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The check needs a task but none was supplied.
    #[error("no task in context")]
    MissingTask,

    /// Invalid check configuration (bad glob, empty command).
    #[error("invalid check: {0}")]
    Invalid(String),

    /// A command check could not run to completion.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Anything else a custom predicate wants to report.
    #[error("{0}")]
    Other(String),
}

/// A pure check over the policy context.
pub trait Predicate: fmt::Debug + Send + Sync {
    /// Evaluate against the context.
    fn evaluate(&self, ctx: &PolicyContext) -> Result<CheckOutcome, PredicateError>;

    /// One-line description used by `flowgate rules`.
    fn describe(&self) -> String;
}

/// Built-in checks, as written in the workflow document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckSpec {
    /// A file matching the glob exists under the project root.
    Artifact { pattern: String },

    /// A non-empty file matching the glob exists.
    Log { pattern: String },

    /// Every checklist item on the task is done.
    Checklist {
        #[serde(rename = "allowEmpty", alias = "allow_empty", default = "default_true")]
        allow_empty: bool,
    },

    /// The task carries a label.
    Label { name: String },

    /// A shell command exits 0 within its timeout.
    Command {
        run: String,

        #[serde(
            rename = "timeoutSecs",
            alias = "timeout_secs",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        timeout_secs: Option<u64>,
    },
}

fn default_true() -> bool {
    true
}

impl Predicate for CheckSpec {
    fn evaluate(&self, ctx: &PolicyContext) -> Result<CheckOutcome, PredicateError> {
        match self {
            Self::Artifact { pattern } => {
                let found = find_matching(ctx, pattern, false)?;
                Ok(match found {
                    Some(path) => CheckOutcome::pass(format!("found {path}")),
                    None => CheckOutcome::fail(format!("no file matches '{pattern}'")),
                })
            }
            Self::Log { pattern } => {
                let found = find_matching(ctx, pattern, true)?;
                Ok(match found {
                    Some(path) => CheckOutcome::pass(format!("found {path}")),
                    None => CheckOutcome::fail(format!("no non-empty log matches '{pattern}'")),
                })
            }
            Self::Checklist { allow_empty } => {
                let task = ctx.task().ok_or(PredicateError::MissingTask)?;
                if task.checklist.is_empty() {
                    return Ok(if *allow_empty {
                        CheckOutcome::pass("checklist is empty")
                    } else {
                        CheckOutcome::fail("checklist is empty")
                    });
                }
                let open: Vec<&str> = task.open_items().map(|i| i.text.as_str()).collect();
                Ok(if open.is_empty() {
                    CheckOutcome::pass(format!("{} item(s) complete", task.checklist.len()))
                } else {
                    CheckOutcome::fail(format!(
                        "{} of {} item(s) open: {}",
                        open.len(),
                        task.checklist.len(),
                        open.join("; ")
                    ))
                })
            }
            Self::Label { name } => {
                let task = ctx.task().ok_or(PredicateError::MissingTask)?;
                Ok(if task.has_label(name) {
                    CheckOutcome::pass(format!("task has label '{name}'"))
                } else {
                    CheckOutcome::fail(format!("task lacks label '{name}'"))
                })
            }
            Self::Command { run, timeout_secs } => {
                if run.trim().is_empty() {
                    return Err(PredicateError::Invalid("empty command".to_string()));
                }
                let timeout = timeout_secs.map_or(ctx.command_timeout(), Duration::from_secs);
                let result = Executor::new(timeout).run(run, ctx.root())?;
                Ok(if result.success() {
                    CheckOutcome::pass(format!("'{run}' succeeded"))
                } else {
                    let code = result.code().map_or_else(|| "signal".to_string(), |c| c.to_string());
                    CheckOutcome::fail(format!("'{run}' exited with {code}"))
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Artifact { pattern } => format!("artifact {pattern}"),
            Self::Log { pattern } => format!("log {pattern}"),
            Self::Checklist { allow_empty: true } => "checklist complete".to_string(),
            Self::Checklist { allow_empty: false } => "checklist complete (non-empty)".to_string(),
            Self::Label { name } => format!("label {name}"),
            Self::Command { run, .. } => format!("command `{run}`"),
        }
    }
}

/// Wraps a closure as a predicate.
pub struct FnPredicate<F> {
    description: String,
    func: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&PolicyContext) -> Result<CheckOutcome, PredicateError> + Send + Sync,
{
    pub fn new(description: impl Into<String>, func: F) -> Self {
        Self { description: description.into(), func }
    }
}

impl<F> fmt::Debug for FnPredicate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPredicate").field("description", &self.description).finish()
    }
}

impl<F> Predicate for FnPredicate<F>
where
    F: Fn(&PolicyContext) -> Result<CheckOutcome, PredicateError> + Send + Sync,
{
    fn evaluate(&self, ctx: &PolicyContext) -> Result<CheckOutcome, PredicateError> {
        (self.func)(ctx)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// Find the first file (in sorted walk order) whose root-relative path
/// matches `pattern`.
fn find_matching(
    ctx: &PolicyContext,
    pattern: &str,
    require_content: bool,
) -> Result<Option<String>, PredicateError> {
    let matcher = glob_to_regex(pattern)?;
    let root = ctx.root();
    if !root.is_dir() {
        return Err(PredicateError::Io {
            path: root.display().to_string(),
            message: "project root is not a directory".to_string(),
        });
    }

    let walker = WalkDir::new(root)
        .max_depth(ctx.max_depth())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !e.file_name().to_str().is_some_and(|n| ctx.is_ignored_dir(n))
        });

    for entry in walker {
        let entry = entry.map_err(|e| PredicateError::Io {
            path: e.path().map_or_else(|| root.display().to_string(), |p| p.display().to_string()),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_path(root, entry.path());
        if !matcher.is_match(&relative) {
            continue;
        }
        if require_content {
            let len = entry.metadata().map(|m| m.len()).map_err(|e| PredicateError::Io {
                path: relative.clone(),
                message: e.to_string(),
            })?;
            if len == 0 {
                continue;
            }
        }
        return Ok(Some(relative));
    }
    Ok(None)
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Translate a glob (`*`, `?`, `**`) into an anchored regex over
/// `/`-separated relative paths.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, PredicateError> {
    let pattern = pattern.trim_start_matches("./");
    if pattern.is_empty() {
        return Err(PredicateError::Invalid("empty glob pattern".to_string()));
    }

    let mut re = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    // `**/` matches zero or more directories
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re).map_err(|e| PredicateError::Invalid(format!("bad glob '{pattern}': {e}")))
}
