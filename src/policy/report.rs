//! Compliance reports.

use std::fmt;

use serde::Serialize;

use super::mode::{EnforcementMode, Severity};

/// Classification of one phase invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Passed,
    PassedWithWarnings,
    Blocked,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::PassedWithWarnings => "PASSED_WITH_WARNINGS",
            Self::Blocked => "BLOCKED",
        }
    }

    pub fn is_blocked(self) -> bool {
        self == Self::Blocked
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Passed,
    Failed,
    /// The predicate could not reach a verdict; counts as failed
    Error,
}

impl EntryStatus {
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Passed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

/// One evaluated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub code: String,
    pub severity: Severity,
    /// Effective mode after overrides and caps
    pub mode: EnforcementMode,
    pub status: EntryStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ReportEntry {
    pub fn passed(&self) -> bool {
        !self.status.is_failure()
    }

    /// Failed under `enforce`.
    pub fn is_blocking(&self) -> bool {
        self.status.is_failure() && self.mode == EnforcementMode::Enforce
    }

    /// Failed under `warn`.
    pub fn is_warning(&self) -> bool {
        self.status.is_failure() && self.mode == EnforcementMode::Warn
    }
}

/// Aggregated result of evaluating every rule that applies to one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub phase: String,
    pub outcome: Outcome,
    /// The phase is advisory-only; failures never block
    pub advisory_phase: bool,
    /// `--warn-only` was in effect
    pub warn_only: bool,
    pub entries: Vec<ReportEntry>,
}

impl ComplianceReport {
    /// Build a report, classifying its outcome from the entries.
    pub fn new(
        phase: impl Into<String>,
        entries: Vec<ReportEntry>,
        advisory_phase: bool,
        warn_only: bool,
    ) -> Self {
        let outcome = classify(&entries);
        Self { phase: phase.into(), outcome, advisory_phase, warn_only, entries }
    }

    pub fn entry(&self, code: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.code == code)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.status.is_failure())
    }

    pub fn blocking(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.is_warning())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Human-readable rendering used by the CLI.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Pretty JSON; stable for identical inputs.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// BLOCKED if any enforce-mode rule failed, PASSED_WITH_WARNINGS if only
/// warn-mode rules failed, PASSED otherwise.
pub fn classify(entries: &[ReportEntry]) -> Outcome {
    if entries.iter().any(ReportEntry::is_blocking) {
        Outcome::Blocked
    } else if entries.iter().any(ReportEntry::is_warning) {
        Outcome::PassedWithWarnings
    } else {
        Outcome::Passed
    }
}

impl fmt::Display for ComplianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase '{}': {}", self.phase, self.outcome)?;
        let mut notes = Vec::new();
        if self.advisory_phase {
            notes.push("advisory phase");
        }
        if self.warn_only {
            notes.push("warn-only");
        }
        if !notes.is_empty() {
            write!(f, " ({})", notes.join(", "))?;
        }
        writeln!(f)?;

        if self.entries.is_empty() {
            return writeln!(f, "  no rules apply");
        }

        for entry in &self.entries {
            let mark = match (entry.status, entry.mode) {
                (EntryStatus::Passed, _) => "ok",
                (_, EnforcementMode::Enforce) => "FAIL",
                (_, EnforcementMode::Warn) => "WARN",
                (_, EnforcementMode::Disabled) => "skip",
            };
            writeln!(
                f,
                "  [{mark:>4}] {} ({}, {}): {}",
                entry.code, entry.severity, entry.mode, entry.message
            )?;
            if entry.status.is_failure() {
                if let Some(remediation) = &entry.remediation {
                    writeln!(f, "         fix: {remediation}")?;
                }
            }
        }
        Ok(())
    }
}
