//! Phase gate.
//!
//! Joins the workflow graph and the policy engine at invocation time: ask
//! the transition guard, evaluate policy only when the guard allows, and
//! classify the result. [`PhaseGate::advance`] additionally records the new
//! state in a [`TaskStore`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::policy::{ComplianceReport, EvaluationOptions, Outcome, PolicyContext, PolicyEngine};
use crate::task::{StoreError, TaskStore};
use crate::workflow::{authorize_with, Decision, GuardError, GuardOptions, WorkflowGraph};

/// Process exit codes.
pub mod exit {
    /// Phase may proceed (warnings, if any, go to stderr)
    pub const SUCCESS: i32 = 0;
    /// Any other failure
    pub const FAILURE: i32 = 1;
    /// Command-line usage error
    pub const USAGE: i32 = 2;
    /// A blocking rule failed
    pub const BLOCKED: i32 = 3;
    /// The transition guard denied the phase
    pub const DENIED: i32 = 4;
    /// The task store reported a stale state
    pub const STATE_CONFLICT: i32 = 5;
    /// Workflow could not be loaded or failed validation
    pub const CONFIG: i32 = 6;
}

/// One phase invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseRequest {
    pub phase: String,
    pub current_state: String,
    /// Bypass a guard denial along a declared emergency path
    pub force: bool,
    /// Cap enforce-mode rules at warn for this call only
    pub warn_only: bool,
}

impl PhaseRequest {
    pub fn new(phase: impl Into<String>, current_state: impl Into<String>) -> Self {
        Self { phase: phase.into(), current_state: current_state.into(), ..Self::default() }
    }

    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn warn_only(mut self, warn_only: bool) -> Self {
        self.warn_only = warn_only;
        self
    }
}

/// Result of a gated phase invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateOutcome {
    /// Allowed and no enforce-mode rule failed.
    Proceed { next_state: String, override_used: bool, report: ComplianceReport },

    /// Allowed by the guard, stopped by policy.
    Blocked { next_state: String, override_used: bool, report: ComplianceReport },

    /// Stopped by the guard; policy was not evaluated.
    Denied { current_state: String, phase: String, valid_inputs: Vec<String> },
}

impl GateOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Proceed { .. } => exit::SUCCESS,
            Self::Blocked { .. } => exit::BLOCKED,
            Self::Denied { .. } => exit::DENIED,
        }
    }

    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed { .. })
    }

    pub fn report(&self) -> Option<&ComplianceReport> {
        match self {
            Self::Proceed { report, .. } | Self::Blocked { report, .. } => Some(report),
            Self::Denied { .. } => None,
        }
    }

    /// State the task moves to if the phase completes.
    pub fn next_state(&self) -> Option<&str> {
        match self {
            Self::Proceed { next_state, .. } | Self::Blocked { next_state, .. } => Some(next_state),
            Self::Denied { .. } => None,
        }
    }

    pub fn override_used(&self) -> bool {
        match self {
            Self::Proceed { override_used, .. } | Self::Blocked { override_used, .. } => {
                *override_used
            }
            Self::Denied { .. } => false,
        }
    }

    /// Proceeded, but warn-mode rules failed.
    pub fn has_warnings(&self) -> bool {
        self.report().is_some_and(|r| r.outcome == Outcome::PassedWithWarnings)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied { current_state, phase, valid_inputs } => write!(
                f,
                "DENIED: task is in '{current_state}'; phase '{phase}' requires one of {{{}}}",
                valid_inputs.join(", ")
            ),
            Self::Proceed { next_state, override_used, report }
            | Self::Blocked { next_state, override_used, report } => {
                write!(f, "{report}")?;
                let verb = if self.is_proceed() { "Next state" } else { "Would move to" };
                write!(f, "{verb}: {next_state}")?;
                if *override_used {
                    write!(f, " (guard override used)")?;
                }
                Ok(())
            }
        }
    }
}

/// Failure of [`PhaseGate::advance`].
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdvanceError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Store(e) if e.is_conflict() => exit::STATE_CONFLICT,
            _ => exit::FAILURE,
        }
    }
}

/// Guard plus policy for one workflow.
#[derive(Debug, Clone, Copy)]
pub struct PhaseGate<'a> {
    graph: &'a WorkflowGraph,
    engine: &'a PolicyEngine,
}

impl<'a> PhaseGate<'a> {
    pub fn new(graph: &'a WorkflowGraph, engine: &'a PolicyEngine) -> Self {
        Self { graph, engine }
    }

    /// Authorize, then evaluate policy when allowed.
    pub fn run(&self, request: &PhaseRequest, ctx: &PolicyContext) -> Result<GateOutcome, GuardError> {
        let decision = authorize_with(
            self.graph,
            &request.current_state,
            &request.phase,
            GuardOptions { force: request.force },
        )?;

        let (next_state, override_used) = match decision {
            Decision::Allowed { next_state, override_used } => (next_state, override_used),
            Decision::Denied { current_state, phase, valid_inputs } => {
                return Ok(GateOutcome::Denied { current_state, phase, valid_inputs });
            }
        };

        let advisory_phase = self.graph.find_phase(&request.phase).is_some_and(|p| p.advisory_only);
        let options = EvaluationOptions { warn_only: request.warn_only, advisory_phase };
        let report = self.engine.evaluate(&request.phase, ctx, options);

        Ok(if report.outcome.is_blocked() {
            GateOutcome::Blocked { next_state, override_used, report }
        } else {
            GateOutcome::Proceed { next_state, override_used, report }
        })
    }

    /// Read a task, gate the phase from its stored state and, when the phase
    /// may proceed, write the new state with a compare-and-set.
    ///
    /// `request.current_state` is replaced by the stored state.
    pub fn advance<S: TaskStore + ?Sized>(
        &self,
        store: &S,
        task_id: &str,
        mut request: PhaseRequest,
        ctx: PolicyContext,
    ) -> Result<GateOutcome, AdvanceError> {
        let task = store.read(task_id)?;
        request.current_state.clone_from(&task.state);
        let ctx = ctx.with_task(task);

        let outcome = self.run(&request, &ctx)?;
        if let GateOutcome::Proceed { next_state, .. } = &outcome {
            store.write_state(task_id, &request.current_state, next_state)?;
        }
        Ok(outcome)
    }
}
