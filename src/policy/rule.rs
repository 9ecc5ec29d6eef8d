//! Compliance rules.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::checks::Predicate;
use super::mode::{EnforcementMode, Severity};

/// Phases a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseScope {
    /// Every phase
    All,
    /// Only the named phases (sorted, deduplicated)
    Only(Vec<String>),
}

impl PhaseScope {
    /// Scope limited to the given phases.
    pub fn only<I, S>(phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut phases: Vec<String> = phases.into_iter().map(Into::into).collect();
        phases.sort();
        phases.dedup();
        Self::Only(phases)
    }

    pub fn applies_to(&self, phase: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(phases) => phases.binary_search_by(|p| p.as_str().cmp(phase)).is_ok(),
        }
    }
}

impl fmt::Display for PhaseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(phases) => f.write_str(&phases.join(", ")),
        }
    }
}

impl Serialize for PhaseScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Only(phases) => phases.serialize(serializer),
        }
    }
}

/// A named, severity-tagged check run before a phase.
#[derive(Clone)]
pub struct Rule {
    /// Unique code (`PRD-001`)
    pub code: String,

    pub description: Option<String>,

    pub severity: Severity,

    pub scope: PhaseScope,

    /// The check itself
    pub predicate: Arc<dyn Predicate>,

    /// Shown to the user when the rule fails
    pub remediation: Option<String>,

    /// Mode declared on the rule, replacing the severity-based default
    pub mode: Option<EnforcementMode>,
}

impl Rule {
    /// Create a rule that applies to every phase.
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        predicate: impl Predicate + 'static,
    ) -> Self {
        Self {
            code: code.into(),
            description: None,
            severity,
            scope: PhaseScope::All,
            predicate: Arc::new(predicate),
            remediation: None,
            mode: None,
        }
    }

    /// Create a blocking rule.
    pub fn blocking(code: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        Self::new(code, Severity::Blocking, predicate)
    }

    /// Create an advisory rule.
    pub fn advisory(code: impl Into<String>, predicate: impl Predicate + 'static) -> Self {
        Self::new(code, Severity::Advisory, predicate)
    }

    /// Limit the rule to the given phases.
    #[must_use]
    pub fn for_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = PhaseScope::only(phases);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Declare the rule's own default mode.
    #[must_use]
    pub fn with_mode(mut self, mode: EnforcementMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Mode used when no override applies.
    pub fn builtin_mode(&self) -> EnforcementMode {
        self.mode.unwrap_or_else(|| self.severity.builtin_mode())
    }

    pub fn applies_to(&self, phase: &str) -> bool {
        self.scope.applies_to(phase)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("code", &self.code)
            .field("severity", &self.severity)
            .field("scope", &self.scope)
            .field("check", &self.predicate.describe())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::checks::CheckSpec;

    fn label(name: &str) -> CheckSpec {
        CheckSpec::Label { name: name.to_string() }
    }

    #[test]
    fn test_scope() {
        let scope = PhaseScope::only(["plan", "assess", "plan"]);
        assert_eq!(scope, PhaseScope::Only(vec!["assess".to_string(), "plan".to_string()]));
        assert!(scope.applies_to("plan"));
        assert!(!scope.applies_to("implement"));
        assert!(PhaseScope::All.applies_to("anything"));
        assert_eq!(scope.to_string(), "assess, plan");
    }

    #[test]
    fn test_scope_serializes_keyword_or_list() {
        assert_eq!(serde_json::to_string(&PhaseScope::All).unwrap(), r#""all""#);
        assert_eq!(serde_json::to_string(&PhaseScope::only(["b", "a"])).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_builtin_mode() {
        let rule = Rule::blocking("R1", label("x"));
        assert_eq!(rule.builtin_mode(), EnforcementMode::Enforce);

        let rule = Rule::advisory("R2", label("x"));
        assert_eq!(rule.builtin_mode(), EnforcementMode::Warn);

        let rule = Rule::blocking("R3", label("x")).with_mode(EnforcementMode::Disabled);
        assert_eq!(rule.builtin_mode(), EnforcementMode::Disabled);
    }

    #[test]
    fn test_debug_shows_check() {
        let rule = Rule::blocking("R1", label("sec")).for_phases(["plan"]);
        let text = format!("{rule:?}");
        assert!(text.contains("R1"));
        assert!(text.contains("label sec"));
    }
}
