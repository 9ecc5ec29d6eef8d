//! Policy engine.
//!
//! Holds a catalog of severity-tagged rules, evaluates the ones that apply
//! to a phase against a read-only [`PolicyContext`], resolves each rule's
//! enforcement mode and aggregates a [`ComplianceReport`].

mod catalog;
mod checks;
mod context;
mod engine;
mod mode;
mod report;
mod rule;

pub use catalog::{CatalogError, RuleCatalog};
pub use checks::{glob_to_regex, CheckOutcome, CheckSpec, FnPredicate, Predicate, PredicateError};
pub use context::{default_ignore_dirs, PolicyContext};
pub use engine::{evaluate, EvaluationOptions, PolicyEngine};
pub use mode::{resolve_mode, EnforcementConfig, EnforcementMode, Severity};
pub use report::{classify, ComplianceReport, EntryStatus, Outcome, ReportEntry};
pub use rule::{PhaseScope, Rule};
