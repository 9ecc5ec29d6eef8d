//! Structural validation of workflow graphs.
//!
//! Checks run in a fixed order:
//! 1. reference integrity of every phase's states
//! 2. reachability of every declared state from the initial state
//! 3. progress (no phase outputs one of its own inputs)
//! 4. determinism (one output per `(state, phase)` pair)
//!
//! followed by the lifecycle checks (terminal states, dead ends, roles).
//! An empty issue list means the graph is usable.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use super::error::GraphValidationError;
use super::graph::{StateId, WorkflowGraph};

/// Category of a graph issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// A phase or the initial state references an undeclared state
    UndeclaredState,
    /// A phase has no input states
    EmptyInputs,
    /// The graph declares no states at all
    NoInitialState,
    /// A declared state cannot be reached from the initial state
    Unreachable,
    /// A phase outputs one of its own input states
    SelfLoop,
    /// A `(state, phase)` pair leads to more than one state
    AmbiguousTransition,
    /// No state is terminal
    NoTerminalState,
    /// A non-terminal state has no outgoing transition
    DeadEnd,
    /// A phase names a role the document does not declare
    UnknownRole,
}

impl IssueKind {
    /// Stable code used in reports and CLI output.
    pub fn code(self) -> &'static str {
        match self {
            Self::UndeclaredState => "UNDECLARED_STATE",
            Self::EmptyInputs => "EMPTY_INPUTS",
            Self::NoInitialState => "NO_INITIAL_STATE",
            Self::Unreachable => "UNREACHABLE",
            Self::SelfLoop => "SELF_LOOP",
            Self::AmbiguousTransition => "AMBIGUOUS_TRANSITION",
            Self::NoTerminalState => "NO_TERMINAL_STATE",
            Self::DeadEnd => "DEAD_END",
            Self::UnknownRole => "UNKNOWN_ROLE",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphIssue {
    pub kind: IssueKind,

    /// State or phase the issue is about
    pub subject: String,

    pub message: String,
}

impl GraphIssue {
    fn new(kind: IssueKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind, subject: subject.into(), message: message.into() }
    }
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Run every structural check and collect the issues found.
pub fn validate(graph: &WorkflowGraph) -> Vec<GraphIssue> {
    let mut issues = Vec::new();
    check_references(graph, &mut issues);
    check_reachability(graph, &mut issues);
    check_progress(graph, &mut issues);
    check_determinism(graph, &mut issues);
    check_lifecycle(graph, &mut issues);
    check_roles(graph, &mut issues);

    if issues.is_empty() {
        tracing::debug!(
            states = graph.states().len(),
            phases = graph.phases().len(),
            "Workflow graph is valid"
        );
    } else {
        tracing::debug!(count = issues.len(), "Workflow graph has issues");
    }
    issues
}

/// Validate and turn a non-empty issue list into an error.
pub fn ensure_valid(graph: &WorkflowGraph) -> Result<(), GraphValidationError> {
    let issues = validate(graph);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(GraphValidationError { issues })
    }
}

fn check_references(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    if let Some(initial) = graph.initial() {
        if !graph.state(initial).declared {
            issues.push(GraphIssue::new(
                IssueKind::UndeclaredState,
                graph.state_name(initial),
                format!("initial state '{}' is not declared", graph.state_name(initial)),
            ));
        }
    }

    for phase in graph.phases() {
        if phase.inputs.is_empty() {
            issues.push(GraphIssue::new(
                IssueKind::EmptyInputs,
                &phase.name,
                format!("phase '{}' has no input states", phase.name),
            ));
        }
        for &input in &phase.inputs {
            if !graph.state(input).declared {
                issues.push(GraphIssue::new(
                    IssueKind::UndeclaredState,
                    &phase.name,
                    format!(
                        "phase '{}' input state '{}' is not declared",
                        phase.name,
                        graph.state_name(input)
                    ),
                ));
            }
        }
        if !graph.state(phase.output).declared {
            issues.push(GraphIssue::new(
                IssueKind::UndeclaredState,
                &phase.name,
                format!(
                    "phase '{}' output state '{}' is not declared",
                    phase.name,
                    graph.state_name(phase.output)
                ),
            ));
        }
        for &state in &phase.emergency_from {
            if !graph.state(state).declared {
                issues.push(GraphIssue::new(
                    IssueKind::UndeclaredState,
                    &phase.name,
                    format!(
                        "phase '{}' emergency state '{}' is not declared",
                        phase.name,
                        graph.state_name(state)
                    ),
                ));
            }
        }
    }
}

fn check_reachability(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    let Some(initial) = graph.initial() else {
        issues.push(GraphIssue::new(
            IssueKind::NoInitialState,
            "(graph)",
            "workflow declares no states",
        ));
        return;
    };

    let mut visited = vec![false; graph.states().len()];
    let mut queue = VecDeque::from([initial]);
    visited[initial.index()] = true;

    while let Some(state) = queue.pop_front() {
        for t in graph.outgoing(state) {
            if !visited[t.to.index()] {
                visited[t.to.index()] = true;
                queue.push_back(t.to);
            }
        }
    }

    for (i, state) in graph.states().iter().enumerate() {
        if state.declared && !visited[i] {
            issues.push(GraphIssue::new(
                IssueKind::Unreachable,
                &state.name,
                format!(
                    "state '{}' is not reachable from initial state '{}'",
                    state.name,
                    graph.state_name(initial)
                ),
            ));
        }
    }
}

fn check_progress(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    for phase in graph.phases() {
        if phase.inputs.contains(&phase.output) {
            issues.push(GraphIssue::new(
                IssueKind::SelfLoop,
                &phase.name,
                format!(
                    "phase '{}' outputs its own input state '{}'",
                    phase.name,
                    graph.state_name(phase.output)
                ),
            ));
        }
    }
}

fn check_determinism(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    // (from, phase name) -> distinct outputs, kept in first-seen order
    let mut seen: Vec<((StateId, &str), Vec<StateId>)> = Vec::new();
    for t in graph.transitions() {
        let key = (t.from, graph.phase(t.phase).name.as_str());
        match seen.iter_mut().find(|(k, _)| *k == key) {
            Some((_, outputs)) => {
                if !outputs.contains(&t.to) {
                    outputs.push(t.to);
                }
            }
            None => seen.push((key, vec![t.to])),
        }
    }

    for ((from, phase), outputs) in seen {
        if outputs.len() > 1 {
            let names: Vec<&str> = outputs.iter().map(|&s| graph.state_name(s)).collect();
            issues.push(GraphIssue::new(
                IssueKind::AmbiguousTransition,
                phase,
                format!(
                    "phase '{}' from state '{}' leads to multiple states: {}",
                    phase,
                    graph.state_name(from),
                    names.join(", ")
                ),
            ));
        }
    }
}

fn check_lifecycle(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    if graph.initial().is_none() {
        return;
    }
    if graph.terminal_states().is_empty() {
        issues.push(GraphIssue::new(
            IssueKind::NoTerminalState,
            "(graph)",
            "workflow has no terminal state",
        ));
    }

    for id in graph.state_ids() {
        let state = graph.state(id);
        if state.declared && !graph.is_terminal(id) && graph.outgoing(id).next().is_none() {
            issues.push(GraphIssue::new(
                IssueKind::DeadEnd,
                &state.name,
                format!("non-terminal state '{}' has no outgoing phase", state.name),
            ));
        }
    }
}

fn check_roles(graph: &WorkflowGraph, issues: &mut Vec<GraphIssue>) {
    let Some(roles) = graph.roles() else {
        return;
    };
    let known: HashSet<&str> = roles.iter().map(String::as_str).collect();
    for phase in graph.phases() {
        for role in &phase.roles {
            if !known.contains(role.as_str()) {
                issues.push(GraphIssue::new(
                    IssueKind::UnknownRole,
                    &phase.name,
                    format!("phase '{}' names undeclared role '{}'", phase.name, role),
                ));
            }
        }
    }
}
