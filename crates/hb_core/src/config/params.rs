//! Rule parameter descriptor table.
//!
//! The descriptor data is embedded at compile time and parsed once on
//! first access. Descriptors declare what the governance process may
//! change; the values themselves live in [`super::RuleSet`] snapshots.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::RuleValue;

/// Parameter descriptor YAML (compile-time embedded).
pub const RULE_PARAMS_YAML: &str = include_str!("../../data/rule_params.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Float,
    Bool,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamKind::Int => "int",
            ParamKind::Float => "float",
            ParamKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub default: RuleValue,
    #[serde(default)]
    pub about: String,
}

impl ParamSpec {
    /// Range check for a candidate value of the right kind. Bool
    /// parameters carry no range.
    pub fn in_range(&self, value: &RuleValue) -> bool {
        let numeric = match value {
            RuleValue::Int(v) => *v as f64,
            RuleValue::Float(v) => *v,
            RuleValue::Bool(_) => return true,
        };
        if let Some(min) = self.min {
            if numeric < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if numeric > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Deserialize)]
struct ParamFile {
    parameters: Vec<ParamSpec>,
}

pub struct ParamTable {
    specs: Vec<ParamSpec>,
    by_name: BTreeMap<String, usize>,
}

impl ParamTable {
    fn from_yaml(source: &str) -> Self {
        let file: ParamFile =
            serde_yaml::from_str(source).expect("Failed to parse rule_params.yaml");
        let mut by_name = BTreeMap::new();
        for (idx, spec) in file.parameters.iter().enumerate() {
            assert_eq!(
                spec.default.kind(),
                spec.kind,
                "default for {} does not match declared kind",
                spec.name
            );
            assert!(
                spec.in_range(&spec.default),
                "default for {} is outside its declared range",
                spec.name
            );
            let previous = by_name.insert(spec.name.clone(), idx);
            assert!(previous.is_none(), "duplicate parameter {}", spec.name);
        }
        Self {
            specs: file.parameters,
            by_name,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

static PARAM_TABLE: Lazy<ParamTable> = Lazy::new(|| ParamTable::from_yaml(RULE_PARAMS_YAML));

/// The embedded descriptor table.
///
/// # Panics
///
/// Panics if the embedded YAML fails to parse, which cannot happen in a
/// normal build.
pub fn param_table() -> &'static ParamTable {
    &PARAM_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_parses_and_indexes() {
        let table = param_table();
        assert!(!table.is_empty());
        let cap = table.get("possession_cap").unwrap();
        assert_eq!(cap.kind, ParamKind::Int);
        assert_eq!(cap.default, RuleValue::Int(400));
    }

    #[test]
    fn unknown_name_is_absent() {
        assert!(param_table().get("no_such_parameter").is_none());
    }

    #[test]
    fn ranges_cover_defaults() {
        for spec in param_table().iter() {
            assert!(spec.in_range(&spec.default), "{} default out of range", spec.name);
        }
    }
}
