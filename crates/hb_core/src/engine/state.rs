//! Mutable in-game state.
//!
//! Everything here lives and dies inside one `simulate_game` call.

use std::collections::BTreeMap;

use crate::models::{Attributes, Team, TeamSide};

use super::defense::DefensiveCall;

/// Snapshot of one on-court competitor taken at possession start.
/// Stamina inside a possession is the value at its start; drains land
/// when the possession ends.
#[derive(Debug, Clone)]
pub struct PlayerView {
    pub id: String,
    pub attrs: Attributes,
    pub stamina: f32,
}

#[derive(Debug)]
pub struct GameState {
    /// Running score as `[home, away]`. Effects may move it; it is
    /// floored at zero when their deltas are applied.
    pub score: [i64; 2],
    /// Current period. Endgame possessions run at trigger quarter + 1.
    pub quarter: u8,
    /// Global possession counter, incremented as each possession starts.
    pub possession: u32,
    /// Stamina per competitor id, both rosters, clamped to [0, 1].
    pub stamina: BTreeMap<String, f32>,
    /// Indices into each roster's `all()` order for the three on court.
    pub active: [Vec<usize>; 2],
    /// Team fouls per side per half.
    pub team_fouls: [[u16; 2]; 2],
    /// Defensive call for the possession in flight.
    pub defense_call: Option<DefensiveCall>,
    endgame_target: Option<i64>,
}

impl GameState {
    pub fn new(home: &Team, away: &Team) -> Self {
        let mut stamina = BTreeMap::new();
        for competitor in home.roster.all().chain(away.roster.all()) {
            stamina.insert(competitor.id.clone(), 1.0);
        }
        Self {
            score: [0, 0],
            quarter: 0,
            possession: 0,
            stamina,
            active: [vec![0, 1, 2], vec![0, 1, 2]],
            team_fouls: [[0, 0], [0, 0]],
            defense_call: None,
            endgame_target: None,
        }
    }

    pub fn endgame_target(&self) -> Option<i64> {
        self.endgame_target
    }

    pub fn endgame_active(&self) -> bool {
        self.endgame_target.is_some()
    }

    /// Sets the dynamic target. Monotonic: once computed it never moves
    /// for the rest of the game, so a second call is ignored.
    pub fn set_endgame_target(&mut self, target: i64) {
        debug_assert!(self.endgame_target.is_none(), "endgame target set twice");
        self.endgame_target.get_or_insert(target);
    }

    pub fn leader(&self) -> Option<TeamSide> {
        match self.score[0].cmp(&self.score[1]) {
            std::cmp::Ordering::Greater => Some(TeamSide::Home),
            std::cmp::Ordering::Less => Some(TeamSide::Away),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// 0 for the first half, 1 afterwards. The endgame period counts as
    /// the second half.
    pub fn half_index(&self, quarter_count: u8) -> usize {
        if self.quarter <= quarter_count / 2 {
            0
        } else {
            1
        }
    }

    pub fn stamina_of(&self, id: &str) -> f32 {
        self.stamina.get(id).copied().unwrap_or(1.0)
    }

    pub fn adjust_stamina(&mut self, id: &str, delta: f32) {
        if let Some(value) = self.stamina.get_mut(id) {
            *value = (*value + delta).clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Competitor, Roster};

    fn team(id: &str) -> Team {
        let attrs = Attributes::build([50; 9], 450).unwrap();
        let c = |cid: &str| Competitor::new(format!("{id}-{cid}"), cid, attrs).unwrap();
        Team::new(
            id,
            id.to_uppercase(),
            Roster::new(vec![c("a"), c("b"), c("c")], vec![c("d")]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn endgame_target_is_monotonic() {
        let mut state = GameState::new(&team("h"), &team("a"));
        state.set_endgame_target(53);
        assert_eq!(state.endgame_target(), Some(53));
        // Release builds must also ignore a second write.
        state.endgame_target = Some(53);
        assert_eq!(state.endgame_target(), Some(53));
    }

    #[test]
    fn stamina_adjust_clamps() {
        let mut state = GameState::new(&team("h"), &team("a"));
        state.adjust_stamina("h-a", -2.0);
        assert_eq!(state.stamina_of("h-a"), 0.0);
        state.adjust_stamina("h-a", 5.0);
        assert_eq!(state.stamina_of("h-a"), 1.0);
    }

    #[test]
    fn half_index_splits_on_quarter_count() {
        let mut state = GameState::new(&team("h"), &team("a"));
        state.quarter = 2;
        assert_eq!(state.half_index(4), 0);
        state.quarter = 3;
        assert_eq!(state.half_index(4), 1);
    }
}
