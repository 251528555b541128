//! Domain records shared across the engine.
//!
//! Everything in this module is either an input the caller owns
//! (competitors, rosters) or an output the caller receives (possession
//! records, game results). The engine itself never holds onto any of it
//! after `simulate_game` returns.

pub mod attributes;
pub mod record;
pub mod result;
pub mod team;

pub use attributes::{Attributes, ATTRIBUTE_MAX, ATTRIBUTE_MIN};
pub use record::{ActionKind, PossessionOutcome, PossessionRecord, TurnoverKind};
pub use result::{BoxScore, GameResult, PeriodScore};
pub use team::{Competitor, Roster, Team, STARTERS_ON_COURT};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the matchup a team plays on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

impl TeamSide {
    pub fn other(self) -> Self {
        match self {
            TeamSide::Home => TeamSide::Away,
            TeamSide::Away => TeamSide::Home,
        }
    }

    /// Index into `[home, away]` shaped arrays.
    pub fn index(self) -> usize {
        match self {
            TeamSide::Home => 0,
            TeamSide::Away => 1,
        }
    }
}

/// Creation-time validation failures for domain records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("attribute {name} is {value}, outside {min}..={max}")]
    AttributeOutOfRange {
        name: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("attribute total {total} does not match budget {budget}")]
    BudgetMismatch { total: u32, budget: u32 },

    #[error("roster needs exactly {expected} starters, found {found}")]
    WrongStarterCount { expected: usize, found: usize },

    #[error("duplicate competitor id: {id}")]
    DuplicateCompetitorId { id: String },

    #[error("empty id on {what}")]
    EmptyId { what: &'static str },
}
