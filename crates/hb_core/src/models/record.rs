//! Per-possession log entries.
//!
//! Exactly one record is written for every possession, including voided
//! ones. Records are append-only; nothing mutates them after the state
//! machine pushes them.

use serde::{Deserialize, Serialize};

use super::TeamSide;

/// The play that ended the possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ThreePointShot,
    MidRangeShot,
    Drive,
    FastBreak,
    /// Shot-clock expiry forces this one regardless of the chosen action.
    ForcedHeave,
    Pass,
    /// Dead ball with no play, e.g. a possession voided by an effect.
    Stoppage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnoverKind {
    Steal,
    OffensiveFoul,
    OutOfBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PossessionOutcome {
    Made { points: u32, assisted: bool },
    /// Shot missed and the defense secured the rebound.
    Missed,
    Turnover { kind: TurnoverKind },
    FreeThrows { made: u32, attempts: u32 },
    /// No play resolved (voided possession).
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossessionRecord {
    /// 1-based global possession index.
    pub index: u32,
    /// Regulation quarter, or trigger quarter + 1 for the endgame period.
    pub period: u8,
    pub offense: TeamSide,
    pub action: ActionKind,
    pub outcome: PossessionOutcome,
    pub scorer: Option<String>,
    pub defender: Option<String>,
    /// Points the offense scored during this possession, free throws
    /// included. Score changes made by effects are not counted here.
    pub points: u32,
    pub tags: Vec<String>,
}

impl PossessionRecord {
    pub fn is_scoring_play(&self) -> bool {
        self.points > 0
    }
}
