//! Competitor, roster and team records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Attributes, ValidationError};

/// Competitors on the floor at any moment, per side.
pub const STARTERS_ON_COURT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: String,
    pub name: String,
    pub attributes: Attributes,
}

impl Competitor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        attributes: Attributes,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId { what: "competitor" });
        }
        Ok(Self {
            id,
            name: name.into(),
            attributes,
        })
    }
}

/// Three starters plus any number of bench competitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub starters: Vec<Competitor>,
    pub bench: Vec<Competitor>,
}

impl Roster {
    pub fn new(starters: Vec<Competitor>, bench: Vec<Competitor>) -> Result<Self, ValidationError> {
        if starters.len() != STARTERS_ON_COURT {
            return Err(ValidationError::WrongStarterCount {
                expected: STARTERS_ON_COURT,
                found: starters.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for competitor in starters.iter().chain(bench.iter()) {
            if !seen.insert(competitor.id.as_str()) {
                return Err(ValidationError::DuplicateCompetitorId {
                    id: competitor.id.clone(),
                });
            }
        }
        Ok(Self { starters, bench })
    }

    /// Starters first, then bench. Index order is stable for the whole
    /// game and is what the engine's active lists point into.
    pub fn all(&self) -> impl Iterator<Item = &Competitor> {
        self.starters.iter().chain(self.bench.iter())
    }

    pub fn len(&self) -> usize {
        self.starters.len() + self.bench.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub roster: Roster,
}

impl Team {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        roster: Roster,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyId { what: "team" });
        }
        Ok(Self {
            id,
            name: name.into(),
            roster,
        })
    }
}
