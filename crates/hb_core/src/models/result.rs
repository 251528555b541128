//! Terminal game output.
//!
//! `GameResult` is the sink of the simulation pipeline: scores, the
//! period breakdown, the endgame target, the full possession log and the
//! box scores all land here. The caller owns the value outright; the
//! engine keeps no reference to it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PossessionRecord, TeamSide};

/// Points scored by each side within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodScore {
    pub period: u8,
    pub home: i64,
    pub away: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxScore {
    pub competitor_id: String,
    pub team_id: String,
    pub points: u32,
    pub field_goals_made: u32,
    pub field_goals_attempted: u32,
    pub threes_made: u32,
    pub threes_attempted: u32,
    pub free_throws_made: u32,
    pub free_throws_attempted: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub steals: u32,
    pub turnovers: u32,
    pub fouls: u32,
    pub possessions_played: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    /// Seed the game was played under, kept for replay audits.
    pub seed: u64,
    pub home_team_id: String,
    pub away_team_id: String,
    /// Final score as `[home, away]`. Includes effect-driven deltas and,
    /// in a deadlocked game, the tie-break award noted in `notes`.
    pub score: [i64; 2],
    pub period_scores: Vec<PeriodScore>,
    pub endgame_target: i64,
    pub possessions: Vec<PossessionRecord>,
    pub box_scores: BTreeMap<String, BoxScore>,
    pub total_possessions: u32,
    /// Out-of-possession annotations: hook narrative, cap resolution,
    /// tie-break awards.
    pub notes: Vec<String>,
}

impl GameResult {
    pub fn winner(&self) -> Option<TeamSide> {
        match self.score[0].cmp(&self.score[1]) {
            std::cmp::Ordering::Greater => Some(TeamSide::Home),
            std::cmp::Ordering::Less => Some(TeamSide::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn score_for(&self, side: TeamSide) -> i64 {
        self.score[side.index()]
    }
}
