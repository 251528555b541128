//! Versioned rule configuration snapshots.
//!
//! A [`RuleSet`] is an immutable, fully validated set of named parameter
//! values. One snapshot is bound to a game call and never changes during
//! it. Governance produces new snapshots through [`RuleSet::enact`]; a
//! failed enactment leaves the prior snapshot in force and is reported as
//! a rollback, while a failure detected when binding a snapshot to one
//! game halts that game only.

pub mod params;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use params::{param_table, ParamKind, ParamSpec, ParamTable};

/// A single governed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl RuleValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            RuleValue::Bool(_) => ParamKind::Bool,
            RuleValue::Int(_) => ParamKind::Int,
            RuleValue::Float(_) => ParamKind::Float,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RuleValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RuleValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RuleValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleValue::Bool(v) => write!(f, "{}", v),
            RuleValue::Int(v) => write!(f, "{}", v),
            RuleValue::Float(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("unknown rule parameter: {name}")]
    UnknownParameter { name: String },

    #[error("type mismatch for {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("value {value} for {name} is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: String,
        min: f64,
        max: f64,
    },

    #[error("missing rule parameter: {name}")]
    MissingParameter { name: String },

    #[error("unsimulatable configuration: {reason}")]
    Unsimulatable { reason: String },
}

/// Typed rejection of a rule configuration.
///
/// `RollBack` means the whole enactment is refused and the previous
/// configuration stays in effect; `HaltGame` means one game binding
/// failed and only that matchup is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleRejection {
    #[error("rejected, rolling back to previous configuration: {0}")]
    RollBack(RuleError),

    #[error("rejected, halting this game only: {0}")]
    HaltGame(RuleError),
}

/// Immutable validated snapshot of every governed parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    version: u32,
    values: BTreeMap<String, RuleValue>,
}

impl RuleSet {
    /// Snapshot of the league defaults, version 0.
    pub fn league_default() -> Self {
        let values = param_table()
            .iter()
            .map(|spec| (spec.name.clone(), spec.default.clone()))
            .collect();
        Self { version: 0, values }
    }

    /// Build a snapshot from externally supplied values, validating each
    /// against the descriptor table plus the cross-field checks.
    pub fn from_values(
        version: u32,
        values: BTreeMap<String, RuleValue>,
    ) -> Result<Self, RuleError> {
        for (name, value) in &values {
            Self::validate_value(name, value)?;
        }
        for spec in param_table().iter() {
            if !values.contains_key(&spec.name) {
                return Err(RuleError::MissingParameter {
                    name: spec.name.clone(),
                });
            }
        }
        Self::validate_cross(&values)?;
        Ok(Self { version, values })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&RuleValue> {
        self.values.get(name)
    }

    pub fn get_int(&self, name: &str) -> Result<i64, RuleError> {
        self.typed(name)?
            .as_i64()
            .ok_or_else(|| self.mismatch(name, ParamKind::Int))
    }

    pub fn get_float(&self, name: &str) -> Result<f64, RuleError> {
        self.typed(name)?
            .as_f64()
            .ok_or_else(|| self.mismatch(name, ParamKind::Float))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, RuleError> {
        self.typed(name)?
            .as_bool()
            .ok_or_else(|| self.mismatch(name, ParamKind::Bool))
    }

    /// Apply a set of governed changes, producing the next snapshot.
    ///
    /// Any failure, per-value or cross-field, is a
    /// [`RuleRejection::RollBack`]: the receiver is untouched and remains
    /// the configuration in force.
    pub fn enact(
        &self,
        changes: &BTreeMap<String, RuleValue>,
    ) -> Result<RuleSet, RuleRejection> {
        let mut next = self.values.clone();
        for (name, value) in changes {
            Self::validate_value(name, value).map_err(RuleRejection::RollBack)?;
            next.insert(name.clone(), value.clone());
        }
        Self::validate_cross(&next).map_err(RuleRejection::RollBack)?;
        Ok(RuleSet {
            version: self.version + 1,
            values: next,
        })
    }

    /// Binding precondition before a game is simulated under this
    /// snapshot. A failure skips one matchup, not the round.
    pub fn validate_for_game(&self) -> Result<(), RuleRejection> {
        for spec in param_table().iter() {
            match self.values.get(&spec.name) {
                Some(value) => {
                    Self::validate_value(&spec.name, value).map_err(RuleRejection::HaltGame)?
                }
                None => {
                    return Err(RuleRejection::HaltGame(RuleError::MissingParameter {
                        name: spec.name.clone(),
                    }))
                }
            }
        }
        Self::validate_cross(&self.values).map_err(RuleRejection::HaltGame)
    }

    fn typed(&self, name: &str) -> Result<&RuleValue, RuleError> {
        self.values.get(name).ok_or_else(|| {
            if param_table().get(name).is_some() {
                RuleError::MissingParameter { name: name.into() }
            } else {
                RuleError::UnknownParameter { name: name.into() }
            }
        })
    }

    fn mismatch(&self, name: &str, expected: ParamKind) -> RuleError {
        let found = self
            .values
            .get(name)
            .map(RuleValue::kind)
            .unwrap_or(expected);
        RuleError::TypeMismatch {
            name: name.into(),
            expected,
            found,
        }
    }

    fn validate_value(name: &str, value: &RuleValue) -> Result<(), RuleError> {
        let spec = param_table()
            .get(name)
            .ok_or_else(|| RuleError::UnknownParameter { name: name.into() })?;
        if value.kind() != spec.kind {
            return Err(RuleError::TypeMismatch {
                name: name.into(),
                expected: spec.kind,
                found: value.kind(),
            });
        }
        if !spec.in_range(value) {
            return Err(RuleError::OutOfRange {
                name: name.into(),
                value: value.to_string(),
                min: spec.min.unwrap_or(f64::NEG_INFINITY),
                max: spec.max.unwrap_or(f64::INFINITY),
            });
        }
        Ok(())
    }

    /// Checks that only make sense across parameters. These are the
    /// "unsimulatable configuration" guards.
    fn validate_cross(values: &BTreeMap<String, RuleValue>) -> Result<(), RuleError> {
        let int = |name: &str| values.get(name).and_then(RuleValue::as_i64).unwrap_or(0);
        let quarter_count = int("quarter_count");
        let trigger = int("endgame_trigger_quarter");
        let possessions = int("quarter_possessions");
        let cap = int("possession_cap");

        if trigger > quarter_count {
            return Err(RuleError::Unsimulatable {
                reason: format!(
                    "endgame_trigger_quarter {} exceeds quarter_count {}",
                    trigger, quarter_count
                ),
            });
        }
        let regulation = possessions * trigger;
        if cap < regulation + 16 {
            return Err(RuleError::Unsimulatable {
                reason: format!(
                    "possession_cap {} leaves no room after {} regulation possessions",
                    cap, regulation
                ),
            });
        }
        Ok(())
    }
}

/// Denormalized view of one snapshot, bound once per game.
///
/// Typed fields keep the hot path free of string lookups; construction
/// fails on the same conditions `validate_for_game` rejects.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub quarter_count: u8,
    pub quarter_possessions: u32,
    pub endgame_trigger_quarter: u8,
    pub endgame_margin: i64,
    pub possession_cap: u32,
    pub shot_clock_actions: u32,
    pub two_point_value: u32,
    pub three_point_value: u32,
    pub free_throw_value: u32,
    pub bonus_foul_threshold: u8,
    pub base_stamina_drain: f32,
    pub fastbreak_stamina_drain: f32,
    pub quarter_break_recovery: f32,
    pub halftime_recovery: f32,
    pub substitution_at_halftime: bool,
    pub fatigue_sub_enabled: bool,
    pub fatigue_sub_threshold: f32,
    pub shot_probability_scale: f32,
    pub turnover_scale: f32,
    pub foul_rate_scale: f32,
}

impl SimParams {
    pub fn from_rules(rules: &RuleSet) -> Result<Self, RuleError> {
        Ok(Self {
            quarter_count: rules.get_int("quarter_count")? as u8,
            quarter_possessions: rules.get_int("quarter_possessions")? as u32,
            endgame_trigger_quarter: rules.get_int("endgame_trigger_quarter")? as u8,
            endgame_margin: rules.get_int("endgame_margin")?,
            possession_cap: rules.get_int("possession_cap")? as u32,
            shot_clock_actions: rules.get_int("shot_clock_actions")? as u32,
            two_point_value: rules.get_int("two_point_value")? as u32,
            three_point_value: rules.get_int("three_point_value")? as u32,
            free_throw_value: rules.get_int("free_throw_value")? as u32,
            bonus_foul_threshold: rules.get_int("bonus_foul_threshold")? as u8,
            base_stamina_drain: rules.get_float("base_stamina_drain")? as f32,
            fastbreak_stamina_drain: rules.get_float("fastbreak_stamina_drain")? as f32,
            quarter_break_recovery: rules.get_float("quarter_break_recovery")? as f32,
            halftime_recovery: rules.get_float("halftime_recovery")? as f32,
            substitution_at_halftime: rules.get_bool("substitution_at_halftime")?,
            fatigue_sub_enabled: rules.get_bool("fatigue_sub_enabled")?,
            fatigue_sub_threshold: rules.get_float("fatigue_sub_threshold")? as f32,
            shot_probability_scale: rules.get_float("shot_probability_scale")? as f32,
            turnover_scale: rules.get_float("turnover_scale")? as f32,
            foul_rate_scale: rules.get_float("foul_rate_scale")? as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn league_default_is_simulatable() {
        let rules = RuleSet::league_default();
        assert_eq!(rules.version(), 0);
        rules.validate_for_game().unwrap();
        SimParams::from_rules(&rules).unwrap();
    }

    #[test]
    fn enact_bumps_version_and_applies_change() {
        let rules = RuleSet::league_default();
        let mut changes = BTreeMap::new();
        changes.insert("endgame_margin".to_string(), RuleValue::Int(21));
        let next = rules.enact(&changes).unwrap();
        assert_eq!(next.version(), 1);
        assert_eq!(next.get_int("endgame_margin").unwrap(), 21);
        // Prior snapshot untouched.
        assert_eq!(rules.get_int("endgame_margin").unwrap(), 13);
    }

    #[test]
    fn enact_out_of_range_rolls_back() {
        let rules = RuleSet::league_default();
        let mut changes = BTreeMap::new();
        changes.insert("endgame_margin".to_string(), RuleValue::Int(99));
        let rejection = rules.enact(&changes).unwrap_err();
        assert!(matches!(
            rejection,
            RuleRejection::RollBack(RuleError::OutOfRange { .. })
        ));
        assert_eq!(rules.get_int("endgame_margin").unwrap(), 13);
    }

    #[test]
    fn enact_unknown_parameter_rolls_back() {
        let rules = RuleSet::league_default();
        let mut changes = BTreeMap::new();
        changes.insert("gravity".to_string(), RuleValue::Float(0.5));
        let rejection = rules.enact(&changes).unwrap_err();
        assert!(matches!(
            rejection,
            RuleRejection::RollBack(RuleError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn enact_type_mismatch_rolls_back() {
        let rules = RuleSet::league_default();
        let mut changes = BTreeMap::new();
        changes.insert("endgame_margin".to_string(), RuleValue::Bool(true));
        let rejection = rules.enact(&changes).unwrap_err();
        assert!(matches!(
            rejection,
            RuleRejection::RollBack(RuleError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn cross_field_failure_rolls_back_whole_enactment() {
        let rules = RuleSet::league_default();
        let mut changes = BTreeMap::new();
        // Each value is individually in range but together the cap no
        // longer covers regulation play.
        changes.insert("quarter_possessions".to_string(), RuleValue::Int(60));
        changes.insert("endgame_trigger_quarter".to_string(), RuleValue::Int(8));
        changes.insert("quarter_count".to_string(), RuleValue::Int(8));
        changes.insert("possession_cap".to_string(), RuleValue::Int(120));
        let rejection = rules.enact(&changes).unwrap_err();
        assert!(matches!(
            rejection,
            RuleRejection::RollBack(RuleError::Unsimulatable { .. })
        ));
        // Prior configuration still in force.
        assert_eq!(rules.get_int("quarter_possessions").unwrap(), 20);
        rules.validate_for_game().unwrap();
    }

    #[test]
    fn untagged_values_round_trip_through_json() {
        let rules = RuleSet::league_default();
        let json = serde_json::to_string(&rules).unwrap();
        let back: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(rules, back);
    }
}
