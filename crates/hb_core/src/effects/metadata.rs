//! In-memory per-entity metadata with dirty tracking.
//!
//! The store has no persistence of its own. An external collaborator
//! hydrates it through `load` before a round and flushes whatever
//! `drain_dirty` returns afterwards. Every mutator marks its key dirty;
//! `load` never does. Backed by ordered maps so traversal order, and
//! with it anything derived from traversal, is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    League,
    Team,
    Competitor,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::League => "league",
            EntityKind::Team => "team",
            EntityKind::Competitor => "competitor",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetaKey {
    pub kind: EntityKind,
    pub id: String,
    pub field: String,
}

impl MetaKey {
    pub fn new(kind: EntityKind, id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            field: field.into(),
        }
    }

    pub fn team(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(EntityKind::Team, id, field)
    }

    pub fn competitor(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(EntityKind::Competitor, id, field)
    }

    pub fn league(field: impl Into<String>) -> Self {
        Self::new(EntityKind::League, "league", field)
    }
}

impl std::fmt::Display for MetaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.kind, self.id, self.field)
    }
}

/// JSON-safe primitive values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetaValue::Bool(_) => "bool",
            MetaValue::Int(_) => "int",
            MetaValue::Float(_) => "float",
            MetaValue::Text(_) => "text",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Int(v) => Some(*v as f64),
            MetaValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("cannot {op} {key}: existing value is {found}")]
    TypeMismatch {
        key: String,
        op: &'static str,
        found: &'static str,
    },

    #[error("cannot {op} {key} by a {by} amount")]
    BadAmount { key: String, op: &'static str, by: &'static str },
}

#[derive(Debug, Default, Clone)]
pub struct MetadataStore {
    entries: BTreeMap<MetaKey, MetaValue>,
    dirty: BTreeSet<MetaKey>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &MetaKey) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hydrate entries from storage. Never marks anything dirty.
    pub fn load(&mut self, entries: impl IntoIterator<Item = (MetaKey, MetaValue)>) {
        for (key, value) in entries {
            self.entries.insert(key, value);
        }
    }

    pub fn set(&mut self, key: MetaKey, value: MetaValue) {
        self.entries.insert(key.clone(), value);
        self.dirty.insert(key);
    }

    /// Add to a numeric entry. A missing entry starts from zero of the
    /// amount's own type.
    pub fn increment(&mut self, key: &MetaKey, amount: &MetaValue) -> Result<(), MetadataError> {
        self.add(key, amount, "increment", 1.0)
    }

    pub fn decrement(&mut self, key: &MetaKey, amount: &MetaValue) -> Result<(), MetadataError> {
        self.add(key, amount, "decrement", -1.0)
    }

    /// Flip a boolean entry. A missing entry toggles to `true`.
    pub fn toggle(&mut self, key: &MetaKey) -> Result<bool, MetadataError> {
        let next = match self.entries.get(key) {
            None => true,
            Some(MetaValue::Bool(value)) => !value,
            Some(other) => {
                return Err(MetadataError::TypeMismatch {
                    key: key.to_string(),
                    op: "toggle",
                    found: other.type_name(),
                })
            }
        };
        self.entries.insert(key.clone(), MetaValue::Bool(next));
        self.dirty.insert(key.clone());
        Ok(next)
    }

    /// Deep, isolated copy for safe external consumption.
    pub fn snapshot(&self) -> BTreeMap<MetaKey, MetaValue> {
        self.entries.clone()
    }

    /// Entries mutated since the last drain, in key order, then clears
    /// the dirty set.
    pub fn drain_dirty(&mut self) -> Vec<(MetaKey, MetaValue)> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|key| {
                let value = self.entries.get(&key).cloned()?;
                Some((key, value))
            })
            .collect()
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    fn add(
        &mut self,
        key: &MetaKey,
        amount: &MetaValue,
        op: &'static str,
        sign: f64,
    ) -> Result<(), MetadataError> {
        let next = match (self.entries.get(key), amount) {
            (None, MetaValue::Int(by)) => MetaValue::Int((sign as i64) * by),
            (None, MetaValue::Float(by)) => MetaValue::Float(sign * by),
            (Some(MetaValue::Int(current)), MetaValue::Int(by)) => {
                MetaValue::Int(current + (sign as i64) * by)
            }
            (Some(MetaValue::Float(current)), MetaValue::Float(by)) => {
                MetaValue::Float(current + sign * by)
            }
            (Some(MetaValue::Float(current)), MetaValue::Int(by)) => {
                MetaValue::Float(current + sign * (*by as f64))
            }
            (Some(other), MetaValue::Int(_) | MetaValue::Float(_)) => {
                return Err(MetadataError::TypeMismatch {
                    key: key.to_string(),
                    op,
                    found: other.type_name(),
                })
            }
            (_, bad) => {
                return Err(MetadataError::BadAmount {
                    key: key.to_string(),
                    op,
                    by: bad.type_name(),
                })
            }
        };
        self.entries.insert(key.clone(), next);
        self.dirty.insert(key.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(field: &str) -> MetaKey {
        MetaKey::team("alpha", field)
    }

    #[test]
    fn load_never_marks_dirty() {
        let mut store = MetadataStore::new();
        store.load([(key("momentum"), MetaValue::Int(3))]);
        assert_eq!(store.dirty_len(), 0);
        assert_eq!(store.get(&key("momentum")), Some(&MetaValue::Int(3)));
        assert!(store.drain_dirty().is_empty());
    }

    #[test]
    fn every_mutator_marks_dirty() {
        let mut store = MetadataStore::new();
        store.set(key("a"), MetaValue::Int(1));
        store.increment(&key("b"), &MetaValue::Int(2)).unwrap();
        store.decrement(&key("c"), &MetaValue::Int(1)).unwrap();
        store.toggle(&key("d")).unwrap();
        assert_eq!(store.dirty_len(), 4);
    }

    #[test]
    fn drain_dirty_returns_exactly_the_written_set_then_clears() {
        let mut store = MetadataStore::new();
        store.load([(key("loaded"), MetaValue::Int(9))]);
        store.set(key("written"), MetaValue::Text("yes".into()));
        store.increment(&key("count"), &MetaValue::Int(1)).unwrap();

        let drained = store.drain_dirty();
        let fields: Vec<&str> = drained.iter().map(|(k, _)| k.field.as_str()).collect();
        assert_eq!(fields, ["count", "written"]);

        // A second drain with no writes in between is empty.
        assert!(store.drain_dirty().is_empty());

        // New writes dirty again, including rewrites of loaded entries.
        store.set(key("loaded"), MetaValue::Int(10));
        let drained = store.drain_dirty();
        assert_eq!(drained, vec![(key("loaded"), MetaValue::Int(10))]);
    }

    #[test]
    fn increment_starts_missing_entries_at_zero() {
        let mut store = MetadataStore::new();
        store.increment(&key("n"), &MetaValue::Int(5)).unwrap();
        assert_eq!(store.get(&key("n")), Some(&MetaValue::Int(5)));
        store.decrement(&key("m"), &MetaValue::Int(2)).unwrap();
        assert_eq!(store.get(&key("m")), Some(&MetaValue::Int(-2)));
    }

    #[test]
    fn increment_rejects_non_numeric_targets() {
        let mut store = MetadataStore::new();
        store.set(key("tag"), MetaValue::Text("hot".into()));
        let err = store.increment(&key("tag"), &MetaValue::Int(1)).unwrap_err();
        assert!(matches!(err, MetadataError::TypeMismatch { .. }));
    }

    #[test]
    fn toggle_missing_becomes_true() {
        let mut store = MetadataStore::new();
        assert!(store.toggle(&key("flag")).unwrap());
        assert!(!store.toggle(&key("flag")).unwrap());
    }

    #[test]
    fn snapshot_is_isolated() {
        let mut store = MetadataStore::new();
        store.set(key("a"), MetaValue::Int(1));
        let snap = store.snapshot();
        store.set(key("a"), MetaValue::Int(2));
        assert_eq!(snap.get(&key("a")), Some(&MetaValue::Int(1)));
    }
}
