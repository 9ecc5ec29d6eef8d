//! Workflow document schema.
//!
//! Mirrors the on-disk YAML/TOML/JSON structure. Enumerated values (modes,
//! severities) stay strings here so the loader can report the exact path of
//! a bad value.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::policy::CheckSpec;

/// A workflow document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowDocument {
    /// Informational document version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Initial state; defaults to the first declared state
    #[serde(default, alias = "initial_state", skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,

    /// Allowed role names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(default)]
    pub states: Vec<StateDoc>,

    /// Phases in declaration order
    #[serde(default)]
    pub phases: OrderedMap<PhaseDoc>,

    /// Rule catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDoc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<EnforcementDoc>,
}

/// A declared state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDoc {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<bool>,
}

/// A phase definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PhaseDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "input_states")]
    pub input_states: Vec<String>,

    #[serde(alias = "output_state")]
    pub output_state: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    #[serde(default, alias = "advisory_only")]
    pub advisory_only: bool,

    /// States from which `--force` is honoured
    #[serde(default, alias = "emergency_from", skip_serializing_if = "Vec::is_empty")]
    pub emergency_from: Vec<String>,
}

/// A rule definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDoc {
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `blocking` or `advisory`
    pub severity: String,

    /// Phase list or the keyword `all`; absent means all phases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<ScopeDoc>,

    pub check: CheckSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,

    /// Rule's own default mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Rule scope as written: a keyword or a list of phase names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeDoc {
    Keyword(String),
    List(Vec<String>),
}

/// Enforcement overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnforcementDoc {
    /// Global default mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Phase name -> mode
    #[serde(default)]
    pub phases: OrderedMap<String>,

    /// Rule code -> mode
    #[serde(default)]
    pub rules: OrderedMap<String>,
}

/// A string-keyed map that keeps declaration order and duplicate keys, so
/// the loader can reject duplicates instead of silently keeping the last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<T>(pub Vec<(String, T)>);

impl<T> OrderedMap<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: Serialize> Serialize for OrderedMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OrderedMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
            type Value = OrderedMap<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}
