//! Hook vocabulary and firing contexts.
//!
//! The hook set is closed and versioned with the crate: effects can only
//! attach to the points listed here. Each firing builds a context
//! carrying only the fields that phase can know, and dispatch produces a
//! single merged [`HookOutcome`] that the caller applies atomically
//! before default behavior proceeds.

use serde::{Deserialize, Serialize};

use crate::models::{GameResult, TeamSide};

/// Fixed moments where registered effects may fire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Before a possession resolves. The only hook whose default
    /// behavior is a whole resolvable unit, so the only one that honors
    /// `block_default` (the possession is voided).
    PossessionStart,
    /// After the possession's record is finalized.
    PossessionEnd,
    QuarterEnd,
    Halftime,
    /// When the dynamic target is computed.
    EndgameStart,
    /// After the last possession, before the result freezes.
    GameEnd,
    /// Once per completed game while the round is being processed.
    PostGame,
    /// Over the assembled round report, before it is handed out.
    PreReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    Simulation,
    Round,
    Report,
}

impl HookPoint {
    pub const ALL: [HookPoint; 8] = [
        HookPoint::PossessionStart,
        HookPoint::PossessionEnd,
        HookPoint::QuarterEnd,
        HookPoint::Halftime,
        HookPoint::EndgameStart,
        HookPoint::GameEnd,
        HookPoint::PostGame,
        HookPoint::PreReport,
    ];

    pub fn phase(self) -> HookPhase {
        match self {
            HookPoint::PossessionStart
            | HookPoint::PossessionEnd
            | HookPoint::QuarterEnd
            | HookPoint::Halftime
            | HookPoint::EndgameStart
            | HookPoint::GameEnd => HookPhase::Simulation,
            HookPoint::PostGame => HookPhase::Round,
            HookPoint::PreReport => HookPhase::Report,
        }
    }
}

/// Simulation-phase context: game, competitor and rule state only.
#[derive(Debug, Clone)]
pub struct SimContext {
    pub home_team_id: String,
    pub away_team_id: String,
    pub offense: TeamSide,
    pub score: [i64; 2],
    pub quarter: u8,
    pub possession: u32,
    pub endgame_active: bool,
    pub rule_version: u32,
    /// Competitor ids on the floor, per side.
    pub active: [Vec<String>; 2],
}

impl SimContext {
    pub fn team_id(&self, side: TeamSide) -> &str {
        match side {
            TeamSide::Home => &self.home_team_id,
            TeamSide::Away => &self.away_team_id,
        }
    }

    pub fn leader(&self) -> Option<TeamSide> {
        match self.score[0].cmp(&self.score[1]) {
            std::cmp::Ordering::Greater => Some(TeamSide::Home),
            std::cmp::Ordering::Less => Some(TeamSide::Away),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Round-phase context. `current` is the game a `PostGame` firing is
/// about; it is absent for hooks fired over the round as a whole.
#[derive(Debug, Clone, Copy)]
pub struct RoundContext<'a> {
    pub season_id: &'a str,
    pub round_number: u32,
    pub results: &'a [GameResult],
    pub current: Option<&'a GameResult>,
}

/// Report-phase context over the in-progress report payload.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub season_id: &'a str,
    pub round_number: u32,
    pub lines: &'a [String],
}

#[derive(Debug, Clone, Copy)]
pub enum HookContext<'a> {
    Sim(&'a SimContext),
    Round(RoundContext<'a>),
    Report(ReportContext<'a>),
}

/// Merged output of one hook firing.
///
/// Combination rules per field: score and stamina deltas add, the shot
/// probability delta adds (the probability engine clamps later),
/// narrative concatenates in effect order, and block flags OR together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOutcome {
    /// Additive score change as `[home, away]`.
    pub score_delta: [i64; 2],
    /// Additive shot probability change for the affected possession.
    pub shot_prob_delta: f32,
    /// Additive stamina change per competitor id. Application clamps
    /// the resulting value to [0, 1].
    pub stamina_delta: Vec<(String, f32)>,
    pub narrative: Vec<String>,
    /// Suppress the default behavior of the hook point, where the hook
    /// point honors it.
    pub block_default: bool,
}

impl HookOutcome {
    /// Fold another payload in under the documented combination rules.
    pub fn absorb(&mut self, other: HookOutcome) {
        self.score_delta[0] += other.score_delta[0];
        self.score_delta[1] += other.score_delta[1];
        self.shot_prob_delta += other.shot_prob_delta;
        self.stamina_delta.extend(other.stamina_delta);
        self.narrative.extend(other.narrative);
        self.block_default |= other.block_default;
    }

    pub fn is_empty(&self) -> bool {
        self.score_delta == [0, 0]
            && self.shot_prob_delta == 0.0
            && self.stamina_delta.is_empty()
            && self.narrative.is_empty()
            && !self.block_default
    }
}
