//! Enforcement modes and their resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a failed rule affects the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    /// Failure blocks the phase
    Enforce,
    /// Failure is reported only
    Warn,
    /// Rule is evaluated for the record but ignored
    Disabled,
}

impl EnforcementMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enforce => "enforce",
            Self::Warn => "warn",
            Self::Disabled => "disabled",
        }
    }

    /// Downgrade `enforce` to `warn`, leaving the other modes alone.
    #[must_use]
    pub fn capped_at_warn(self) -> Self {
        match self {
            Self::Enforce => Self::Warn,
            other => other,
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enforce" => Ok(Self::Enforce),
            "warn" => Ok(Self::Warn),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("unknown enforcement mode '{other}' (expected enforce, warn or disabled)")),
        }
    }
}

/// Rule severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Advisory,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Advisory => "advisory",
        }
    }

    /// Mode used when nothing else is configured.
    pub fn builtin_mode(self) -> EnforcementMode {
        match self {
            Self::Blocking => EnforcementMode::Enforce,
            Self::Advisory => EnforcementMode::Warn,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project-wide enforcement settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnforcementConfig {
    /// Global default mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<EnforcementMode>,

    /// Phase name -> default mode for rules run in that phase
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub phases: BTreeMap<String, EnforcementMode>,

    /// Rule code -> override mode
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, EnforcementMode>,
}

impl EnforcementConfig {
    /// Set the global default.
    #[must_use]
    pub fn with_default(mut self, mode: EnforcementMode) -> Self {
        self.default = Some(mode);
        self
    }

    /// Set a phase default.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>, mode: EnforcementMode) -> Self {
        self.phases.insert(phase.into(), mode);
        self
    }

    /// Set a rule override.
    #[must_use]
    pub fn with_rule(mut self, code: impl Into<String>, mode: EnforcementMode) -> Self {
        self.rules.insert(code.into(), mode);
        self
    }

    /// Resolve the effective mode of one rule in one phase.
    pub fn resolve(&self, code: &str, phase: &str, builtin: EnforcementMode) -> EnforcementMode {
        resolve_mode(
            self.rules.get(code).copied(),
            self.phases.get(phase).copied(),
            self.default,
            builtin,
        )
    }
}

/// Pick the effective mode: rule override, then phase default, then global
/// default, then the rule's built-in mode.
pub fn resolve_mode(
    rule_override: Option<EnforcementMode>,
    phase_default: Option<EnforcementMode>,
    global_default: Option<EnforcementMode>,
    builtin: EnforcementMode,
) -> EnforcementMode {
    rule_override.or(phase_default).or(global_default).unwrap_or(builtin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use EnforcementMode::{Disabled, Enforce, Warn};

    #[test]
    fn test_precedence_order() {
        assert_eq!(resolve_mode(Some(Disabled), Some(Enforce), Some(Enforce), Enforce), Disabled);
        assert_eq!(resolve_mode(None, Some(Warn), Some(Enforce), Enforce), Warn);
        assert_eq!(resolve_mode(None, None, Some(Disabled), Enforce), Disabled);
        assert_eq!(resolve_mode(None, None, None, Warn), Warn);
    }

    #[test]
    fn test_builtin_mode_by_severity() {
        assert_eq!(Severity::Blocking.builtin_mode(), Enforce);
        assert_eq!(Severity::Advisory.builtin_mode(), Warn);
    }

    #[test]
    fn test_config_resolve() {
        let config = EnforcementConfig::default()
            .with_default(Enforce)
            .with_phase("plan", Warn)
            .with_rule("R1", Disabled);

        assert_eq!(config.resolve("R1", "plan", Enforce), Disabled);
        assert_eq!(config.resolve("R2", "plan", Enforce), Warn);
        assert_eq!(config.resolve("R2", "implement", Warn), Enforce);
        assert_eq!(EnforcementConfig::default().resolve("R2", "plan", Warn), Warn);
    }

    #[test]
    fn test_cap_at_warn() {
        assert_eq!(Enforce.capped_at_warn(), Warn);
        assert_eq!(Warn.capped_at_warn(), Warn);
        assert_eq!(Disabled.capped_at_warn(), Disabled);
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("ENFORCE".parse::<EnforcementMode>(), Ok(Enforce));
        assert_eq!("warn".parse::<EnforcementMode>(), Ok(Warn));
        assert!("block".parse::<EnforcementMode>().is_err());
    }

    #[test]
    fn test_mode_yaml_roundtrip_names() {
        let mode: EnforcementMode = serde_yaml::from_str("disabled").unwrap();
        assert_eq!(mode, Disabled);
        assert_eq!(serde_yaml::to_string(&Warn).unwrap().trim(), "warn");
    }
}
