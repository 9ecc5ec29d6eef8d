//! Workflow state machine.
//!
//! A workflow is a closed set of named states and the phases that move a
//! task between them. Documents are loaded into an immutable
//! [`WorkflowGraph`], checked once by the [`validate`] pass, and queried per
//! request by the transition guard ([`authorize`]).

mod error;
mod graph;
mod guard;
mod loader;
mod schema;
mod template;
mod validator;

pub use error::{ConfigParseError, GraphValidationError, LoadError, LoadResult};
pub use graph::{
    GraphBuilder, Phase, PhaseId, PhaseSpec, State, StateId, Transition, WorkflowGraph,
};
pub use guard::{authorize, authorize_with, Decision, GuardError, GuardOptions};
pub use loader::{
    build_workflow, load_workflow, load_workflow_str, parse_document, parse_workflow_str, Format,
    LoadedWorkflow,
};
pub use schema::{
    EnforcementDoc, OrderedMap, PhaseDoc, RuleDoc, ScopeDoc, StateDoc, WorkflowDocument,
};
pub use template::{DEFAULT_WORKFLOW, DEFAULT_WORKFLOW_FILE};
pub use validator::{ensure_valid, validate, GraphIssue, IssueKind};
