//! Registered effect records.
//!
//! An effect is a structured, externally-proposed modification to
//! simulation behavior. Its kind and every action primitive are closed
//! tagged variants matched exhaustively, so a new kind is a compile
//! error at every dispatch site rather than a silent no-op.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hooks::HookPoint;
use super::metadata::{MetadataError, MetaValue};

pub type EffectId = String;

/// Symbolic target resolved against the firing context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    League,
    OffensiveTeam,
    DefensiveTeam,
    HomeTeam,
    AwayTeam,
    /// Team currently ahead; unresolvable when tied.
    LeadingTeam,
    TrailingTeam,
    /// Winner of the game a round hook is about.
    WinningTeam,
    LosingTeam,
    Team(String),
    Competitor(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparison {
    /// Evaluate against a stored value. Numeric comparisons treat ints
    /// and floats interchangeably; text and bool support equality only.
    /// A shape that cannot be compared evaluates false.
    pub fn evaluate(self, stored: &MetaValue, threshold: &MetaValue) -> bool {
        if let (Some(a), Some(b)) = (stored.as_number(), threshold.as_number()) {
            return match self {
                Comparison::Eq => a == b,
                Comparison::Ne => a != b,
                Comparison::Gt => a > b,
                Comparison::Ge => a >= b,
                Comparison::Lt => a < b,
                Comparison::Le => a <= b,
            };
        }
        match self {
            Comparison::Eq => stored == threshold,
            Comparison::Ne => stored != threshold,
            _ => false,
        }
    }
}

/// One condition clause. Every clause on an effect must hold for it to
/// fire. A missing metadata field fails the clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    pub target: EntityRef,
    pub field: String,
    pub op: Comparison,
    pub value: MetaValue,
}

/// Mutation applied to a metadata entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaOp {
    Set(MetaValue),
    Increment(MetaValue),
    Decrement(MetaValue),
    Toggle,
}

/// Primitive steps a hook-callback effect may take. The closed set is
/// the whole extension surface: nothing here can run arbitrary code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPrimitive {
    ModifyScore { target: EntityRef, delta: i64 },
    ModifyShotProbability { delta: f32 },
    ModifyStamina { target: EntityRef, delta: f32 },
    WriteMetadata { target: EntityRef, field: String, op: MetaOp },
    AddNarrative { text: String },
    BlockDefault,
}

/// The effect's tagged kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectAction {
    /// Resolve a symbolic target, then mutate one metadata field.
    Metadata {
        target: EntityRef,
        field: String,
        op: MetaOp,
    },
    /// Run a short list of closed primitives.
    Callback { steps: Vec<ActionPrimitive> },
    /// Pure narrative injection.
    Narrative { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDuration {
    Permanent,
    /// Active for this many rounds counting the registration round.
    Rounds(u32),
    /// Expires after its first firing.
    SingleUse,
    UntilRepealed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredEffect {
    pub id: EffectId,
    /// Governance proposal this effect came from.
    pub proposal_id: String,
    pub hooks: Vec<HookPoint>,
    #[serde(default)]
    pub conditions: Vec<ConditionClause>,
    pub action: EffectAction,
    pub duration: EffectDuration,
    /// Lower values fire earlier among effects registered the same
    /// round.
    #[serde(default)]
    pub priority: i32,
    pub registered_round: u32,
    /// Position in the event log, assigned by the registry fold.
    #[serde(skip)]
    pub(crate) seq: u64,
    /// Whether the effect has fired this season (single-use tracking).
    #[serde(skip)]
    pub(crate) fired: bool,
}

impl RegisteredEffect {
    pub fn attaches_to(&self, hook: HookPoint) -> bool {
        self.hooks.contains(&hook)
    }

    /// Lifetime check, keyed to the round being ticked. Countdowns are
    /// absolute against the registration round so a rebuilt registry
    /// expires on the same round a continuously-running one would.
    pub fn expired_at(&self, current_round: u32) -> bool {
        match self.duration {
            EffectDuration::Permanent | EffectDuration::UntilRepealed => false,
            EffectDuration::SingleUse => self.fired,
            EffectDuration::Rounds(lifetime) => {
                let elapsed = current_round
                    .checked_sub(self.registered_round)
                    .map(|d| d + 1)
                    .unwrap_or(0);
                elapsed >= lifetime
            }
        }
    }

    pub(crate) fn note_fired(&mut self) {
        self.fired = true;
    }
}

#[derive(Error, Debug)]
pub enum EffectError {
    #[error("target {0:?} cannot be resolved at this hook")]
    UnresolvableTarget(EntityRef),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effect(duration: EffectDuration, registered_round: u32) -> RegisteredEffect {
        RegisteredEffect {
            id: "fx".into(),
            proposal_id: "prop".into(),
            hooks: vec![HookPoint::PossessionStart],
            conditions: vec![],
            action: EffectAction::Narrative { text: "t".into() },
            duration,
            priority: 0,
            registered_round,
            seq: 0,
            fired: false,
        }
    }

    #[test]
    fn two_round_lifetime_survives_one_tick_not_two() {
        let fx = effect(EffectDuration::Rounds(2), 5);
        assert!(!fx.expired_at(5), "still active after the first round");
        assert!(fx.expired_at(6), "expired after the second round");
    }

    #[test]
    fn permanent_and_repealable_never_tick_out() {
        assert!(!effect(EffectDuration::Permanent, 1).expired_at(u32::MAX));
        assert!(!effect(EffectDuration::UntilRepealed, 1).expired_at(u32::MAX));
    }

    #[test]
    fn single_use_expires_only_after_firing() {
        let mut fx = effect(EffectDuration::SingleUse, 1);
        assert!(!fx.expired_at(9));
        fx.note_fired();
        assert!(fx.expired_at(9));
    }

    #[test]
    fn comparisons_mix_int_and_float() {
        assert!(Comparison::Ge.evaluate(&MetaValue::Int(5), &MetaValue::Float(5.0)));
        assert!(Comparison::Lt.evaluate(&MetaValue::Float(4.5), &MetaValue::Int(5)));
        assert!(!Comparison::Gt.evaluate(&MetaValue::Int(4), &MetaValue::Int(5)));
    }

    #[test]
    fn text_supports_equality_only() {
        let a = MetaValue::Text("hot".into());
        let b = MetaValue::Text("hot".into());
        assert!(Comparison::Eq.evaluate(&a, &b));
        assert!(!Comparison::Gt.evaluate(&a, &b));
    }

    #[test]
    fn effect_round_trips_through_json() {
        let fx = RegisteredEffect {
            id: "bonus-3".into(),
            proposal_id: "prop-9".into(),
            hooks: vec![HookPoint::PossessionStart, HookPoint::GameEnd],
            conditions: vec![ConditionClause {
                target: EntityRef::OffensiveTeam,
                field: "momentum".into(),
                op: Comparison::Ge,
                value: MetaValue::Int(5),
            }],
            action: EffectAction::Callback {
                steps: vec![
                    ActionPrimitive::ModifyShotProbability { delta: 0.05 },
                    ActionPrimitive::AddNarrative { text: "crowd roars".into() },
                ],
            },
            duration: EffectDuration::Rounds(3),
            priority: 10,
            registered_round: 2,
            seq: 7,
            fired: true,
        };
        let json = serde_json::to_string(&fx).unwrap();
        let back: RegisteredEffect = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, fx.id);
        assert_eq!(back.action, fx.action);
        // Runtime bookkeeping does not travel.
        assert_eq!(back.seq, 0);
        assert!(!back.fired);
    }
}
