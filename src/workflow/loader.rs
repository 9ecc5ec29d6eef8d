//! Workflow loader.
//!
//! Parses a workflow document into an immutable [`WorkflowGraph`] plus the
//! rule catalog and enforcement settings declared next to it. Parsing is
//! pure; [`load_workflow`] additionally runs the graph validator so a
//! structurally broken workflow never reaches the guard.

use std::collections::HashSet;
use std::path::Path;

use super::error::{ConfigParseError, LoadError, LoadResult};
use super::graph::{GraphBuilder, PhaseSpec, WorkflowGraph};
use super::schema::{EnforcementDoc, RuleDoc, ScopeDoc, WorkflowDocument};
use super::validator;
use crate::policy::{
    EnforcementConfig, EnforcementMode, PolicyEngine, Rule, RuleCatalog, Severity,
};

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    /// Pick a format from the file extension; YAML when unknown.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Self::Toml,
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Everything a workflow document declares.
#[derive(Debug, Clone)]
pub struct LoadedWorkflow {
    pub graph: WorkflowGraph,
    pub catalog: RuleCatalog,
    pub enforcement: EnforcementConfig,
}

impl LoadedWorkflow {
    /// Policy engine over the declared rules.
    pub fn engine(&self) -> PolicyEngine {
        PolicyEngine::new(self.catalog.clone(), self.enforcement.clone())
    }
}

/// Read, parse and validate a workflow file.
pub fn load_workflow(path: &Path) -> LoadResult<LoadedWorkflow> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;
    let workflow = load_workflow_str(&content, Format::from_path(path))?;
    tracing::debug!(
        path = %path.display(),
        states = workflow.graph.states().len(),
        phases = workflow.graph.phases().len(),
        rules = workflow.catalog.len(),
        "Loaded workflow"
    );
    Ok(workflow)
}

/// Parse and validate a workflow document.
pub fn load_workflow_str(content: &str, format: Format) -> LoadResult<LoadedWorkflow> {
    let workflow = parse_workflow_str(content, format)?;
    validator::ensure_valid(&workflow.graph)?;
    Ok(workflow)
}

/// Parse a workflow document without graph validation.
pub fn parse_workflow_str(
    content: &str,
    format: Format,
) -> Result<LoadedWorkflow, ConfigParseError> {
    let doc = parse_document(content, format)?;
    build_workflow(&doc)
}

/// Deserialize the raw document.
pub fn parse_document(content: &str, format: Format) -> Result<WorkflowDocument, ConfigParseError> {
    let parsed = match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| ConfigParseError::root(message.trim_end().to_string()))
}

/// Turn a parsed document into a graph, catalog and enforcement config.
pub fn build_workflow(doc: &WorkflowDocument) -> Result<LoadedWorkflow, ConfigParseError> {
    let mut builder = GraphBuilder::default();
    let states = build_states(doc, &mut builder)?;

    if let Some(initial) = &doc.initial_state {
        if !states.contains(initial.as_str()) {
            return Err(ConfigParseError::new(
                "initialState",
                format!("undeclared state '{initial}'"),
            ));
        }
        builder.set_initial(initial.clone());
    }

    if let Some(roles) = &doc.roles {
        for (i, role) in roles.iter().enumerate() {
            if role.trim().is_empty() {
                return Err(ConfigParseError::new(format!("roles[{i}]"), "role name is empty"));
            }
        }
        builder.set_roles(roles.clone());
    }

    let phases = build_phases(doc, &states, &mut builder)?;
    let catalog = build_catalog(&doc.rules, &phases)?;
    let enforcement = match &doc.enforcement {
        Some(enforcement) => build_enforcement(enforcement, &phases, &catalog)?,
        None => EnforcementConfig::default(),
    };

    Ok(LoadedWorkflow { graph: builder.build(), catalog, enforcement })
}

fn build_states<'a>(
    doc: &'a WorkflowDocument,
    builder: &mut GraphBuilder,
) -> Result<HashSet<&'a str>, ConfigParseError> {
    if doc.states.is_empty() {
        return Err(ConfigParseError::new("states", "at least one state must be declared"));
    }

    let mut seen = HashSet::new();
    for (i, state) in doc.states.iter().enumerate() {
        let path = format!("states[{i}].name");
        if state.name.trim().is_empty() {
            return Err(ConfigParseError::new(path, "state name is empty"));
        }
        if !seen.insert(state.name.as_str()) {
            return Err(ConfigParseError::new(path, format!("duplicate state '{}'", state.name)));
        }
        builder.declare_state(state.name.clone(), state.description.clone(), state.terminal);
    }
    Ok(seen)
}

fn build_phases<'a>(
    doc: &'a WorkflowDocument,
    states: &HashSet<&str>,
    builder: &mut GraphBuilder,
) -> Result<HashSet<&'a str>, ConfigParseError> {
    let check_state = |path: String, name: &str| {
        if states.contains(name) {
            Ok(())
        } else {
            Err(ConfigParseError::new(path, format!("undeclared state '{name}'")))
        }
    };

    let mut seen = HashSet::new();
    for (name, phase) in doc.phases.iter() {
        if name.trim().is_empty() {
            return Err(ConfigParseError::new("phases", "phase name is empty"));
        }
        if !seen.insert(name) {
            return Err(ConfigParseError::new(
                format!("phases.{name}"),
                format!("duplicate phase '{name}'"),
            ));
        }

        if phase.input_states.is_empty() {
            return Err(ConfigParseError::new(
                format!("phases.{name}.inputStates"),
                "at least one input state is required",
            ));
        }
        for (i, input) in phase.input_states.iter().enumerate() {
            check_state(format!("phases.{name}.inputStates[{i}]"), input)?;
        }
        check_state(format!("phases.{name}.outputState"), &phase.output_state)?;
        for (i, from) in phase.emergency_from.iter().enumerate() {
            let path = format!("phases.{name}.emergencyFrom[{i}]");
            check_state(path.clone(), from)?;
            if *from == phase.output_state {
                return Err(ConfigParseError::new(
                    path,
                    format!("'{from}' is the output state of phase '{name}'"),
                ));
            }
        }

        builder.add_phase(PhaseSpec {
            name: name.to_string(),
            description: phase.description.clone(),
            inputs: phase.input_states.clone(),
            output: phase.output_state.clone(),
            roles: phase.roles.clone(),
            advisory_only: phase.advisory_only,
            emergency_from: phase.emergency_from.clone(),
        });
    }
    Ok(seen)
}

fn build_catalog(rules: &[RuleDoc], phases: &HashSet<&str>) -> Result<RuleCatalog, ConfigParseError> {
    let mut catalog = RuleCatalog::new();
    for (i, doc) in rules.iter().enumerate() {
        if doc.code.trim().is_empty() {
            return Err(ConfigParseError::new(format!("rules[{i}].code"), "rule code is empty"));
        }
        let severity = parse_severity(&doc.severity)
            .map_err(|m| ConfigParseError::new(format!("rules[{i}].severity"), m))?;

        let mut rule = Rule::new(doc.code.clone(), severity, doc.check.clone());
        if let Some(description) = &doc.description {
            rule = rule.with_description(description.clone());
        }
        rule.remediation.clone_from(&doc.remediation);

        if let Some(mode) = &doc.mode {
            let mode = parse_mode(mode, &format!("rules[{i}].mode"))?;
            rule = rule.with_mode(mode);
        }

        match &doc.phases {
            None => {}
            Some(ScopeDoc::Keyword(keyword)) if keyword == "all" => {}
            Some(ScopeDoc::Keyword(keyword)) => {
                return Err(ConfigParseError::new(
                    format!("rules[{i}].phases"),
                    format!("unknown scope '{keyword}' (expected a phase list or 'all')"),
                ));
            }
            Some(ScopeDoc::List(list)) => {
                for (j, phase) in list.iter().enumerate() {
                    if !phases.contains(phase.as_str()) {
                        return Err(ConfigParseError::new(
                            format!("rules[{i}].phases[{j}]"),
                            format!("unknown phase '{phase}'"),
                        ));
                    }
                }
                rule = rule.for_phases(list.iter().cloned());
            }
        }

        catalog
            .add(rule)
            .map_err(|e| ConfigParseError::new(format!("rules[{i}].code"), e.to_string()))?;
    }
    Ok(catalog)
}

fn build_enforcement(
    doc: &EnforcementDoc,
    phases: &HashSet<&str>,
    catalog: &RuleCatalog,
) -> Result<EnforcementConfig, ConfigParseError> {
    let mut config = EnforcementConfig::default();
    if let Some(mode) = &doc.default {
        config.default = Some(parse_mode(mode, "enforcement.default")?);
    }

    for (phase, mode) in doc.phases.iter() {
        let path = format!("enforcement.phases.{phase}");
        if !phases.contains(phase) {
            return Err(ConfigParseError::new(path, format!("unknown phase '{phase}'")));
        }
        if config.phases.insert(phase.to_string(), parse_mode(mode, &path)?).is_some() {
            return Err(ConfigParseError::new(path, "duplicate entry"));
        }
    }

    for (code, mode) in doc.rules.iter() {
        let path = format!("enforcement.rules.{code}");
        if !catalog.contains(code) {
            return Err(ConfigParseError::new(path, format!("unknown rule '{code}'")));
        }
        if config.rules.insert(code.to_string(), parse_mode(mode, &path)?).is_some() {
            return Err(ConfigParseError::new(path, "duplicate entry"));
        }
    }
    Ok(config)
}

fn parse_mode(value: &str, path: &str) -> Result<EnforcementMode, ConfigParseError> {
    value.parse().map_err(|message: String| ConfigParseError::new(path, message))
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    match value.to_ascii_lowercase().as_str() {
        "blocking" => Ok(Severity::Blocking),
        "advisory" => Ok(Severity::Advisory),
        other => Err(format!("unknown severity '{other}' (expected blocking or advisory)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PhaseScope;

    const SCENARIO: &str = r"
states:
  - name: ToDo
  - name: Specified
  - name: Done
phases:
  specify:
    inputStates: [ToDo]
    outputState: Specified
  finish:
    inputStates: [Specified]
    outputState: Done
";

    fn parse_err(yaml: &str) -> ConfigParseError {
        parse_workflow_str(yaml, Format::Yaml).unwrap_err()
    }

    #[test]
    fn test_load_scenario() {
        let workflow = load_workflow_str(SCENARIO, Format::Yaml).unwrap();
        let graph = &workflow.graph;
        assert_eq!(graph.states().len(), 3);
        assert_eq!(graph.phases().len(), 2);
        assert_eq!(graph.initial().map(|id| graph.state_name(id)), Some("ToDo"));
        assert!(workflow.catalog.is_empty());
        assert_eq!(workflow.enforcement, EnforcementConfig::default());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_path(Path::new("flow.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("flow.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("flow.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("flow")), Format::Yaml);
    }

    #[test]
    fn test_undeclared_output_names_path() {
        let err = parse_err(&SCENARIO.replace("outputState: Done", "outputState: Shipped"));
        assert_eq!(err.path, "phases.finish.outputState");
        assert!(err.message.contains("Shipped"));
    }

    #[test]
    fn test_undeclared_input_names_path() {
        let err = parse_err(&SCENARIO.replace("inputStates: [Specified]", "inputStates: [Specified, Nope]"));
        assert_eq!(err.path, "phases.finish.inputStates[1]");
    }

    #[test]
    fn test_emergency_path_into_output_rejected() {
        let err = parse_err(&SCENARIO.replace(
            "    outputState: Done\n",
            "    outputState: Done\n    emergencyFrom: [ToDo, Done]\n",
        ));
        assert_eq!(err.path, "phases.finish.emergencyFrom[1]");
        assert!(err.message.contains("output state"));

        let ok = SCENARIO.replace(
            "    outputState: Done\n",
            "    outputState: Done\n    emergencyFrom: [ToDo]\n",
        );
        assert!(parse_workflow_str(&ok, Format::Yaml).is_ok());
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let err = parse_err(&SCENARIO.replace("  - name: Done", "  - name: ToDo"));
        assert_eq!(err.path, "states[2].name");
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let err = parse_err(&SCENARIO.replace("inputStates: [ToDo]", "inputStates: []"));
        assert_eq!(err.path, "phases.specify.inputStates");
    }

    #[test]
    fn test_no_states_rejected() {
        let err = parse_err("phases: {}\n");
        assert_eq!(err.path, "states");
    }

    #[test]
    fn test_undeclared_initial_state() {
        let err = parse_err(&format!("initialState: Backlog\n{SCENARIO}"));
        assert_eq!(err.path, "initialState");
    }

    #[test]
    fn test_syntax_error_is_root() {
        let err = parse_err("states: [\n");
        assert_eq!(err.path, "(root)");
    }

    #[test]
    fn test_duplicate_phase_rejected_in_json() {
        let json = r#"{
            "states": [{"name": "A"}, {"name": "B"}],
            "phases": {
                "go": {"inputStates": ["A"], "outputState": "B"},
                "go": {"inputStates": ["B"], "outputState": "A"}
            }
        }"#;
        let err = parse_workflow_str(json, Format::Json).unwrap_err();
        assert_eq!(err.path, "phases.go");
    }

    #[test]
    fn test_rules_and_enforcement() {
        let yaml = format!(
            r#"{SCENARIO}
rules:
  - code: PRD-001
    description: A PRD exists
    severity: blocking
    phases: [specify]
    check: {{ kind: artifact, pattern: "docs/prd/*.md" }}
    remediation: Write the PRD
  - code: LOG-001
    severity: advisory
    check: {{ kind: log, pattern: ".logs/*.jsonl" }}
    mode: disabled
enforcement:
  default: enforce
  phases: {{ finish: warn }}
  rules: {{ PRD-001: warn }}
"#
        );
        let workflow = load_workflow_str(&yaml, Format::Yaml).unwrap();
        let prd = workflow.catalog.get("PRD-001").unwrap();
        assert_eq!(prd.scope, PhaseScope::only(["specify"]));
        assert_eq!(prd.remediation.as_deref(), Some("Write the PRD"));
        assert_eq!(prd.description.as_deref(), Some("A PRD exists"));

        let log = workflow.catalog.get("LOG-001").unwrap();
        assert_eq!(log.scope, PhaseScope::All);
        assert_eq!(log.builtin_mode(), EnforcementMode::Disabled);

        let enforcement = &workflow.enforcement;
        assert_eq!(enforcement.default, Some(EnforcementMode::Enforce));
        assert_eq!(enforcement.phases.get("finish"), Some(&EnforcementMode::Warn));
        assert_eq!(enforcement.rules.get("PRD-001"), Some(&EnforcementMode::Warn));
    }

    #[test]
    fn test_rule_errors_name_path() {
        let rule = |body: &str| format!("{SCENARIO}\nrules:\n{body}");

        let err = parse_err(&rule(
            "  - code: R1\n    severity: fatal\n    check: { kind: label, name: x }\n",
        ));
        assert_eq!(err.path, "rules[0].severity");

        let err = parse_err(&rule(
            "  - code: R1\n    severity: blocking\n    phases: [ship]\n    check: { kind: label, name: x }\n",
        ));
        assert_eq!(err.path, "rules[0].phases[0]");

        let err = parse_err(&rule(
            "  - code: R1\n    severity: blocking\n    phases: some\n    check: { kind: label, name: x }\n",
        ));
        assert_eq!(err.path, "rules[0].phases");

        let err = parse_err(&rule(
            "  - code: R1\n    severity: blocking\n    check: { kind: label, name: x }\n  - code: R1\n    severity: advisory\n    check: { kind: label, name: y }\n",
        ));
        assert_eq!(err.path, "rules[1].code");

        let err = parse_err(&rule(
            "  - code: R1\n    severity: blocking\n    mode: block\n    check: { kind: label, name: x }\n",
        ));
        assert_eq!(err.path, "rules[0].mode");
    }

    #[test]
    fn test_enforcement_errors_name_path() {
        let err = parse_err(&format!("{SCENARIO}\nenforcement:\n  phases: {{ deploy: warn }}\n"));
        assert_eq!(err.path, "enforcement.phases.deploy");

        let err = parse_err(&format!("{SCENARIO}\nenforcement:\n  rules: {{ R9: warn }}\n"));
        assert_eq!(err.path, "enforcement.rules.R9");

        let err = parse_err(&format!("{SCENARIO}\nenforcement:\n  default: loud\n"));
        assert_eq!(err.path, "enforcement.default");
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
initialState = "ToDo"

[[states]]
name = "ToDo"

[[states]]
name = "Done"

[phases.finish]
inputStates = ["ToDo"]
outputState = "Done"

[[rules]]
code = "R1"
severity = "advisory"
phases = "all"
check = { kind = "checklist", allowEmpty = false }
"#;
        let workflow = load_workflow_str(toml, Format::Toml).unwrap();
        assert_eq!(workflow.graph.phases().len(), 1);
        assert_eq!(workflow.catalog.len(), 1);
    }

    #[test]
    fn test_validation_failure_is_graph_error() {
        let yaml = r"
states:
  - name: ToDo
  - name: Done
  - name: Orphan
phases:
  finish:
    inputStates: [ToDo]
    outputState: Done
";
        let err = load_workflow_str(yaml, Format::Yaml).unwrap_err();
        let LoadError::Graph(graph) = err else { panic!("expected graph error, got {err}") };
        assert!(graph.issues.iter().any(|i| i.subject == "Orphan"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_workflow(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }
}
