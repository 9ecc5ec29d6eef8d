//! Transition guard.
//!
//! Decides whether a phase may run from a task's current state.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::graph::WorkflowGraph;

/// Guard verdict. A denial is ordinary control flow, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The phase may run; `next_state` is always the phase's declared output.
    Allowed { next_state: String, override_used: bool },

    /// The current state is not one of the phase's input states.
    Denied { current_state: String, phase: String, valid_inputs: Vec<String> },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn next_state(&self) -> Option<&str> {
        match self {
            Self::Allowed { next_state, .. } => Some(next_state),
            Self::Denied { .. } => None,
        }
    }

    pub fn override_used(&self) -> bool {
        matches!(self, Self::Allowed { override_used: true, .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allowed { next_state, override_used: false } => {
                write!(f, "allowed: next state is '{next_state}'")
            }
            Self::Allowed { next_state, override_used: true } => {
                write!(f, "allowed by override: next state is '{next_state}'")
            }
            Self::Denied { current_state, phase, valid_inputs } => write!(
                f,
                "task is in '{current_state}'; phase '{phase}' requires one of {{{}}}",
                valid_inputs.join(", ")
            ),
        }
    }
}

/// Request the guard cannot answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("unknown phase '{phase}' (available: {})", available.join(", "))]
    UnknownPhase { phase: String, available: Vec<String> },
}

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardOptions {
    /// Bypass a denial along a declared emergency path
    pub force: bool,
}

/// Authorize `phase` from `current_state`.
pub fn authorize(
    graph: &WorkflowGraph,
    current_state: &str,
    phase: &str,
) -> Result<Decision, GuardError> {
    authorize_with(graph, current_state, phase, GuardOptions::default())
}

/// Authorize with options.
///
/// A forced request is honoured only along a declared emergency path: the
/// phase lists the current state in `emergencyFrom` and the current state is
/// not the phase's output. The result is still the phase's nominal output
/// state.
pub fn authorize_with(
    graph: &WorkflowGraph,
    current_state: &str,
    phase: &str,
    options: GuardOptions,
) -> Result<Decision, GuardError> {
    let Some(phase_def) = graph.find_phase(phase) else {
        return Err(GuardError::UnknownPhase {
            phase: phase.to_string(),
            available: graph.phases().iter().map(|p| p.name.clone()).collect(),
        });
    };
    let next_state = graph.state_name(phase_def.output).to_string();
    let current = graph.state_id(current_state).filter(|&id| graph.state(id).declared);

    if current.is_some_and(|id| phase_def.inputs.contains(&id)) {
        tracing::info!(phase, from = current_state, to = %next_state, "Transition allowed");
        return Ok(Decision::Allowed { next_state, override_used: false });
    }

    if options.force {
        let on_emergency_path = current
            .is_some_and(|id| id != phase_def.output && phase_def.emergency_from.contains(&id));
        if on_emergency_path {
            tracing::warn!(
                phase,
                from = current_state,
                to = %next_state,
                "Transition guard bypassed by override"
            );
            return Ok(Decision::Allowed { next_state, override_used: true });
        }
        tracing::info!(phase, from = current_state, "Override refused: not an emergency path");
    }

    let valid_inputs = phase_def.inputs.iter().map(|&s| graph.state_name(s).to_string()).collect();
    tracing::info!(phase, from = current_state, "Transition denied");
    Ok(Decision::Denied {
        current_state: current_state.to_string(),
        phase: phase.to_string(),
        valid_inputs,
    })
}
