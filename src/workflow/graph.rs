//! Workflow graph.
//!
//! States and phases are interned into dense indices. Each state keeps an
//! adjacency list of its outgoing transitions, so lookups and traversals never
//! chase pointers and the finished graph is immutable and `Send + Sync`.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// Interned state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(u32);

impl StateId {
    /// Index into the graph's state table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned phase identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhaseId(u32);

impl PhaseId {
    /// Index into the graph's phase table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A workflow state.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    /// State label
    pub name: String,

    /// Human description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Explicit terminal flag from the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,

    /// False when the state was only referenced, never declared
    #[serde(skip)]
    pub declared: bool,
}

/// A phase: the named operation that moves a task between states.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Phase name (the command users invoke)
    pub name: String,

    /// Human description
    pub description: Option<String>,

    /// States the phase may start from, in declaration order
    pub inputs: Vec<StateId>,

    /// State the phase leads to
    pub output: StateId,

    /// Roles allowed to run the phase
    pub roles: Vec<String>,

    /// Advisory phases compute compliance but never block
    pub advisory_only: bool,

    /// States from which a forced run is honoured (empty = any declared state)
    pub emergency_from: Vec<StateId>,
}

/// A derived `(from, phase, to)` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateId,
    pub phase: PhaseId,
    pub to: StateId,
}

/// Immutable workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    states: Vec<State>,
    state_index: HashMap<String, StateId>,
    phases: Vec<Phase>,
    phase_index: HashMap<String, PhaseId>,
    transitions: Vec<Transition>,
    outgoing: Vec<Vec<usize>>,
    initial: Option<StateId>,
    roles: Option<Vec<String>>,
}

impl WorkflowGraph {
    /// Start building a graph by hand.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// All states, declared and referenced.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// All phases in declaration order.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Every derived edge.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Declared role names, if the document declares any.
    pub fn roles(&self) -> Option<&[String]> {
        self.roles.as_deref()
    }

    /// Initial state, if the graph has at least one state.
    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    /// Every state id in declaration order.
    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(|i| StateId(i as u32))
    }

    /// Look up a state by label.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.state_index.get(name).copied()
    }

    /// Look up a phase by name. With duplicate names the first wins.
    pub fn phase_id(&self, name: &str) -> Option<PhaseId> {
        self.phase_index.get(name).copied()
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    pub fn phase(&self, id: PhaseId) -> &Phase {
        &self.phases[id.index()]
    }

    /// Label of a state.
    pub fn state_name(&self, id: StateId) -> &str {
        &self.states[id.index()].name
    }

    /// Look up a phase definition by name.
    pub fn find_phase(&self, name: &str) -> Option<&Phase> {
        self.phase_id(name).map(|id| self.phase(id))
    }

    /// Outgoing transitions of a state.
    pub fn outgoing(&self, from: StateId) -> impl Iterator<Item = &Transition> + '_ {
        self.outgoing[from.index()].iter().map(move |&i| &self.transitions[i])
    }

    /// Whether the state is terminal.
    ///
    /// When any state carries an explicit flag only flagged states are terminal;
    /// otherwise states without outgoing transitions are.
    pub fn is_terminal(&self, id: StateId) -> bool {
        if self.has_explicit_terminals() {
            self.states[id.index()].terminal == Some(true)
        } else {
            self.outgoing[id.index()].is_empty()
        }
    }

    /// Whether any state declares `terminal: true`.
    pub fn has_explicit_terminals(&self) -> bool {
        self.states.iter().any(|s| s.terminal == Some(true))
    }

    /// Terminal states in declaration order.
    pub fn terminal_states(&self) -> Vec<StateId> {
        self.state_ids()
            .filter(|&id| self.states[id.index()].declared && self.is_terminal(id))
            .collect()
    }

    /// Render the graph in Graphviz dot format.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph workflow {\n    rankdir=LR;\n");
        for (i, state) in self.states.iter().enumerate() {
            let id = StateId(i as u32);
            let shape = if self.is_terminal(id) { "doublecircle" } else { "box" };
            dot.push_str(&format!("    \"{}\" [shape={}];\n", escape_dot(&state.name), shape));
        }
        for t in &self.transitions {
            let phase = self.phase(t.phase);
            let style = if phase.advisory_only { ", style=dashed" } else { "" };
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"{}];\n",
                escape_dot(self.state_name(t.from)),
                escape_dot(self.state_name(t.to)),
                escape_dot(&phase.name),
                style
            ));
        }
        dot.push_str("}\n");
        dot
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for WorkflowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "States:")?;
        for (i, state) in self.states.iter().enumerate() {
            let id = StateId(i as u32);
            let mut marks = Vec::new();
            if Some(id) == self.initial {
                marks.push("initial");
            }
            if self.is_terminal(id) {
                marks.push("terminal");
            }
            if marks.is_empty() {
                writeln!(f, "  {}", state.name)?;
            } else {
                writeln!(f, "  {} ({})", state.name, marks.join(", "))?;
            }
        }
        writeln!(f, "Phases:")?;
        for phase in &self.phases {
            let inputs: Vec<&str> = phase.inputs.iter().map(|&s| self.state_name(s)).collect();
            write!(
                f,
                "  {}: {{{}}} -> {}",
                phase.name,
                inputs.join(", "),
                self.state_name(phase.output)
            )?;
            if phase.advisory_only {
                write!(f, " [advisory]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Builds a [`WorkflowGraph`].
///
/// The builder does not reject anything: references to unknown states intern
/// an undeclared state and duplicate phase names are kept. Run the validator
/// to find out whether the result is usable.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    states: Vec<State>,
    state_index: HashMap<String, StateId>,
    phases: Vec<Phase>,
    initial: Option<String>,
    roles: Option<Vec<String>>,
}

impl GraphBuilder {
    /// Declare a state.
    #[must_use]
    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.declare_state(name, None, None);
        self
    }

    /// Declare a terminal state.
    #[must_use]
    pub fn terminal_state(mut self, name: impl Into<String>) -> Self {
        self.declare_state(name, None, Some(true));
        self
    }

    /// Declare a state with its full metadata.
    pub fn declare_state(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        terminal: Option<bool>,
    ) -> StateId {
        let name = name.into();
        if let Some(&id) = self.state_index.get(&name) {
            let state = &mut self.states[id.index()];
            state.declared = true;
            state.description = description.or_else(|| state.description.take());
            state.terminal = terminal.or(state.terminal);
            return id;
        }
        let id = StateId(self.states.len() as u32);
        self.states.push(State { name: name.clone(), description, terminal, declared: true });
        self.state_index.insert(name, id);
        id
    }

    fn intern(&mut self, name: &str) -> StateId {
        if let Some(&id) = self.state_index.get(name) {
            return id;
        }
        let id = StateId(self.states.len() as u32);
        self.states.push(State {
            name: name.to_string(),
            description: None,
            terminal: None,
            declared: false,
        });
        self.state_index.insert(name.to_string(), id);
        id
    }

    /// Add a phase with the given input states and output state.
    #[must_use]
    pub fn phase<I, S>(mut self, name: impl Into<String>, inputs: I, output: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inputs: Vec<String> = inputs.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.add_phase(PhaseSpec {
            name: name.into(),
            inputs,
            output: output.to_string(),
            ..PhaseSpec::default()
        });
        self
    }

    /// Add a phase from a full specification.
    pub fn add_phase(&mut self, spec: PhaseSpec) -> PhaseId {
        let mut inputs = Vec::with_capacity(spec.inputs.len());
        for name in &spec.inputs {
            let id = self.intern(name);
            if !inputs.contains(&id) {
                inputs.push(id);
            }
        }
        let output = self.intern(&spec.output);
        let emergency_from = spec.emergency_from.iter().map(|s| self.intern(s)).collect();
        let id = PhaseId(self.phases.len() as u32);
        self.phases.push(Phase {
            name: spec.name,
            description: spec.description,
            inputs,
            output,
            roles: spec.roles,
            advisory_only: spec.advisory_only,
            emergency_from,
        });
        id
    }

    /// Set the initial state. Defaults to the first declared state.
    #[must_use]
    pub fn initial(mut self, name: impl Into<String>) -> Self {
        self.initial = Some(name.into());
        self
    }

    /// Set the initial state in place.
    pub fn set_initial(&mut self, name: impl Into<String>) {
        self.initial = Some(name.into());
    }

    /// Declare the allowed role names.
    pub fn set_roles(&mut self, roles: Vec<String>) {
        self.roles = Some(roles);
    }

    /// Finish the graph, deriving transitions and adjacency lists.
    pub fn build(mut self) -> WorkflowGraph {
        let initial = match self.initial.take() {
            Some(name) => Some(self.intern(&name)),
            None => self.states.iter().position(|s| s.declared).map(|i| StateId(i as u32)),
        };

        let mut phase_index = HashMap::new();
        let mut transitions = Vec::new();
        let mut outgoing = vec![Vec::new(); self.states.len()];
        for (i, phase) in self.phases.iter().enumerate() {
            let pid = PhaseId(i as u32);
            phase_index.entry(phase.name.clone()).or_insert(pid);
            for &from in &phase.inputs {
                outgoing[from.index()].push(transitions.len());
                transitions.push(Transition { from, phase: pid, to: phase.output });
            }
        }

        WorkflowGraph {
            states: self.states,
            state_index: self.state_index,
            phases: self.phases,
            phase_index,
            transitions,
            outgoing,
            initial,
            roles: self.roles,
        }
    }
}

/// Everything needed to add one phase to a [`GraphBuilder`].
#[derive(Debug, Clone, Default)]
pub struct PhaseSpec {
    pub name: String,
    pub description: Option<String>,
    pub inputs: Vec<String>,
    pub output: String,
    pub roles: Vec<String>,
    pub advisory_only: bool,
    pub emergency_from: Vec<String>,
}
