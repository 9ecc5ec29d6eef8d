//! # flowgate
//!
//! Workflow state machine and policy engine for spec-driven development.
//!
//! A project declares its task lifecycle as a graph of states and the phases
//! that move a task between them, plus a catalog of compliance rules. Before
//! a phase runs, flowgate answers two questions:
//!
//! - may this phase run from the task's current state? ([`workflow::authorize`])
//! - do the rules that apply to it pass? ([`policy::PolicyEngine`])
//!
//! [`PhaseGate`] joins the two and maps the result onto exit codes.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a default workflow
//! flowgate init
//!
//! # Can `plan` run for a task in `Specified`?
//! flowgate check plan --state Specified
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::format_push_string)]
#![allow(clippy::needless_pass_by_value)]

pub mod core;
pub mod gate;
pub mod policy;
pub mod task;
pub mod workflow;

pub use gate::{exit, AdvanceError, GateOutcome, PhaseGate, PhaseRequest};
pub use policy::{ComplianceReport, EnforcementConfig, EnforcementMode, Outcome, PolicyEngine, Rule};
pub use task::{FileTaskStore, InMemoryTaskStore, StoreError, TaskRecord, TaskStore};
pub use workflow::{load_workflow, Decision, LoadError, LoadedWorkflow, WorkflowGraph};

/// Version of flowgate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application.
pub const APP_NAME: &str = "flowgate";
