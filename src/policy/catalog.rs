//! Rule catalog.

use std::collections::HashSet;

use thiserror::Error;

use super::rule::Rule;

/// Rejected catalog change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("duplicate rule code '{0}'")]
    DuplicateCode(String),
}

/// Ordered set of rules with unique codes.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    codes: HashSet<String>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting duplicate codes.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        for rule in rules {
            catalog.add(rule)?;
        }
        Ok(catalog)
    }

    /// Append a rule.
    pub fn add(&mut self, rule: Rule) -> Result<(), CatalogError> {
        if !self.codes.insert(rule.code.clone()) {
            return Err(CatalogError::DuplicateCode(rule.code));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules that apply to a phase, in declaration order.
    pub fn applicable<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.applies_to(phase))
    }

    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
