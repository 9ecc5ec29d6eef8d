//! Rule evaluation.

use super::catalog::RuleCatalog;
use super::context::PolicyContext;
use super::mode::{EnforcementConfig, EnforcementMode};
use super::report::{ComplianceReport, EntryStatus, ReportEntry};
use super::rule::Rule;

/// Per-invocation switches that never persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Cap every `enforce` rule at `warn` for this call
    pub warn_only: bool,

    /// The phase is advisory-only: compute the report but never block
    pub advisory_phase: bool,
}

/// Rule catalog plus enforcement settings.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    catalog: RuleCatalog,
    enforcement: EnforcementConfig,
}

impl PolicyEngine {
    pub fn new(catalog: RuleCatalog, enforcement: EnforcementConfig) -> Self {
        Self { catalog, enforcement }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn enforcement(&self) -> &EnforcementConfig {
        &self.enforcement
    }

    /// Effective mode of a rule in a phase, before per-invocation caps.
    pub fn mode_for(&self, rule: &Rule, phase: &str) -> EnforcementMode {
        self.enforcement.resolve(&rule.code, phase, rule.builtin_mode())
    }

    /// Evaluate every rule that applies to `phase`.
    pub fn evaluate(
        &self,
        phase: &str,
        ctx: &PolicyContext,
        options: EvaluationOptions,
    ) -> ComplianceReport {
        evaluate(self.catalog.applicable(phase), phase, ctx, &self.enforcement, options)
    }
}

/// Evaluate `rules` (those not applicable to `phase` are skipped) and
/// classify the result.
///
/// Predicate errors become failed entries with status `error`; evaluation
/// always continues with the next rule.
pub fn evaluate<'a>(
    rules: impl IntoIterator<Item = &'a Rule>,
    phase: &str,
    ctx: &PolicyContext,
    enforcement: &EnforcementConfig,
    options: EvaluationOptions,
) -> ComplianceReport {
    let cap = options.warn_only || options.advisory_phase;
    let mut entries = Vec::new();

    for rule in rules.into_iter().filter(|r| r.applies_to(phase)) {
        let mut mode = enforcement.resolve(&rule.code, phase, rule.builtin_mode());
        if cap {
            mode = mode.capped_at_warn();
        }

        let (status, message) = match rule.predicate.evaluate(ctx) {
            Ok(outcome) if outcome.passed => (EntryStatus::Passed, outcome.detail),
            Ok(outcome) => (EntryStatus::Failed, outcome.detail),
            Err(e) => {
                tracing::warn!(rule = %rule.code, phase, error = %e, "Rule predicate failed");
                (EntryStatus::Error, e.to_string())
            }
        };
        tracing::debug!(rule = %rule.code, phase, %mode, status = status.as_str(), "Evaluated rule");

        entries.push(ReportEntry {
            code: rule.code.clone(),
            severity: rule.severity,
            mode,
            status,
            message,
            remediation: rule.remediation.clone(),
        });
    }

    let report = ComplianceReport::new(phase, entries, options.advisory_phase, options.warn_only);
    tracing::info!(
        phase,
        outcome = %report.outcome,
        rules = report.entries.len(),
        failed = report.failed_count(),
        "Policy evaluated"
    );
    report
}
