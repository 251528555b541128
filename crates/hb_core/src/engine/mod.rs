//! Game orchestration.
//!
//! [`simulate_game`] is a pure function of (teams, rule snapshot, seed):
//! no I/O, no global state, and a private `ChaCha8Rng` owned by the
//! engine value so concurrent callers never interfere. Run it twice with
//! the same inputs and the results are byte-identical.
//!
//! The orchestrator sequences fixed-length quarters up to the configured
//! trigger, applies break recovery and substitution, then switches to
//! the untimed endgame: target = leading score at the boundary plus the
//! configured margin, first side to reach it with a scoring play wins.
//! A possession safety cap guarantees termination under any rule
//! configuration; the cap path resolves by score with a bounded
//! sudden-death tail for ties.

pub mod defense;
pub mod deterministic;
pub mod possession;
pub mod probability;
pub mod stamina;
pub mod state;


use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::{RuleRejection, RuleSet, SimParams};
use crate::effects::{EffectHost, HookContext, HookOutcome, HookPoint, SimContext};
use crate::error::{Result, SimError};
use crate::models::{
    BoxScore, Competitor, GameResult, PeriodScore, PossessionRecord, Team, TeamSide,
};

use possession::PossessionPhase;
use stamina::StaminaModel;
use state::{GameState, PlayerView};

/// Possessions held back from the target chase so a tied game still has
/// room for sudden death under the cap.
const SUDDEN_DEATH_RESERVE: u32 = 8;

/// Dynamic endgame target: the leading score at the trigger boundary
/// plus the configured margin. A tie adds the margin to the tied score.
fn endgame_target(score: [i64; 2], margin: i64) -> i64 {
    score[0].max(score[1]) + margin
}

/// Simulate one game without any registered effects.
pub fn simulate_game(
    home: &Team,
    away: &Team,
    rules: &RuleSet,
    seed: u64,
) -> Result<GameResult> {
    let mut host = EffectHost::default();
    simulate_game_with_effects(home, away, rules, seed, &mut host)
}

/// Simulate one game, firing hooks against the given host.
///
/// Determinism extends to this variant: identical inputs plus an
/// identical host state reproduce the result byte for byte. The host is
/// the only state that outlives the call, through its own dirty-set and
/// tick contracts.
pub fn simulate_game_with_effects(
    home: &Team,
    away: &Team,
    rules: &RuleSet,
    seed: u64,
    host: &mut EffectHost,
) -> Result<GameResult> {
    validate_game_inputs(home, away)?;
    rules.validate_for_game()?;
    let params = SimParams::from_rules(rules)
        .map_err(|error| SimError::Rules(RuleRejection::HaltGame(error)))?;
    let mut engine = GameEngine::new(home, away, params, rules.version(), seed);
    engine.run(host)?;
    Ok(engine.into_result())
}

/// Binding preconditions checked before any possession runs. A failure
/// here halts the affected game only.
fn validate_game_inputs(home: &Team, away: &Team) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for team in [home, away] {
        if team.id.is_empty() {
            return Err(SimError::Contract("team with empty id".into()));
        }
        if team.roster.starters.len() != crate::models::STARTERS_ON_COURT {
            return Err(SimError::Contract(format!(
                "team {} fields {} starters",
                team.id,
                team.roster.starters.len()
            )));
        }
        for competitor in team.roster.all() {
            if competitor.id.is_empty() {
                return Err(SimError::Contract(format!(
                    "competitor with empty id on team {}",
                    team.id
                )));
            }
            if !seen.insert(competitor.id.clone()) {
                return Err(SimError::Contract(format!(
                    "duplicate competitor id {}",
                    competitor.id
                )));
            }
            competitor
                .attributes
                .validate_ranges()
                .map_err(|error| {
                    SimError::Contract(format!("competitor {}: {}", competitor.id, error))
                })?;
        }
    }
    Ok(())
}

pub(crate) struct GameEngine<'a> {
    rng: ChaCha8Rng,
    seed: u64,
    params: SimParams,
    rule_version: u32,
    stamina_model: StaminaModel,
    home: &'a Team,
    away: &'a Team,
    state: GameState,
    records: Vec<PossessionRecord>,
    box_scores: BTreeMap<String, BoxScore>,
    period_scores: Vec<PeriodScore>,
    period_start: [i64; 2],
    next_offense: TeamSide,
    notes: Vec<String>,
}

impl<'a> GameEngine<'a> {
    fn new(home: &'a Team, away: &'a Team, params: SimParams, rule_version: u32, seed: u64) -> Self {
        let mut box_scores = BTreeMap::new();
        for (team, _side) in [(home, TeamSide::Home), (away, TeamSide::Away)] {
            for competitor in team.roster.all() {
                box_scores.insert(
                    competitor.id.clone(),
                    BoxScore {
                        competitor_id: competitor.id.clone(),
                        team_id: team.id.clone(),
                        ..BoxScore::default()
                    },
                );
            }
        }
        let stamina_model = StaminaModel::from_params(&params);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            params,
            rule_version,
            stamina_model,
            home,
            away,
            state: GameState::new(home, away),
            records: Vec::new(),
            box_scores,
            period_scores: Vec::new(),
            period_start: [0, 0],
            next_offense: TeamSide::Home,
            notes: Vec::new(),
        }
    }

    fn run(&mut self, host: &mut EffectHost) -> Result<()> {
        self.tip_off();
        let trigger = self.params.endgame_trigger_quarter;
        for quarter in 1..=trigger {
            self.state.quarter = quarter;
            for _ in 0..self.params.quarter_possessions {
                if self.state.possession >= self.chase_cap() {
                    break;
                }
                self.run_possession(host, PossessionPhase::Regulation)?;
            }
            self.flush_period(quarter);
            let outcome = self.fire_sim_hook(HookPoint::QuarterEnd, self.next_offense, host);
            self.notes.extend(outcome.narrative);
            let halftime = quarter == self.params.quarter_count / 2;
            self.quarter_break(halftime, host);
        }
        self.run_endgame(host)?;
        let outcome = self.fire_sim_hook(HookPoint::GameEnd, self.next_offense, host);
        self.notes.extend(outcome.narrative);
        Ok(())
    }

    fn run_endgame(&mut self, host: &mut EffectHost) -> Result<()> {
        let period = self.params.endgame_trigger_quarter + 1;
        self.state.quarter = period;
        let target = endgame_target(self.state.score, self.params.endgame_margin);
        self.state.set_endgame_target(target);
        log::debug!(
            "endgame target {} (margin {} over the boundary leader)",
            target,
            self.params.endgame_margin
        );
        let outcome = self.fire_sim_hook(HookPoint::EndgameStart, self.next_offense, host);
        self.notes.extend(outcome.narrative);

        loop {
            if self.state.possession >= self.chase_cap() {
                self.resolve_cap(host)?;
                break;
            }
            let digest = self.run_possession(host, PossessionPhase::Endgame)?;
            // The winning possession must be a scoring play; an effect
            // pushing a side past the target does not end the game.
            if digest.points > 0 && self.state.score[digest.offense.index()] >= target {
                break;
            }
        }
        self.flush_period(period);
        Ok(())
    }

    /// Cap resolution: stand on the current score, break a tie with
    /// sudden-death possessions inside the reserved budget, and decide a
    /// still-deadlocked game with one seeded coin.
    fn resolve_cap(&mut self, host: &mut EffectHost) -> Result<()> {
        self.notes.push(format!(
            "possession cap reached at {}; resolving by score",
            self.state.possession
        ));
        while self.state.score[0] == self.state.score[1]
            && self.state.possession < self.params.possession_cap
        {
            self.run_possession(host, PossessionPhase::SuddenDeath)?;
        }
        if self.state.score[0] == self.state.score[1] {
            let home_wins = deterministic::deterministic_bool(
                self.seed,
                u64::from(self.state.possession),
                0,
                deterministic::subcase::DEADLOCK_COIN,
                0.5,
            );
            let winner = if home_wins { TeamSide::Home } else { TeamSide::Away };
            let winner_id = self.team(winner).id.clone();
            self.state.score[winner.index()] += 1;
            self.notes
                .push(format!("deadlock tie-break awarded to {}", winner_id));
            log::warn!(
                "game deadlocked at the possession cap; tie-break to {}",
                winner_id
            );
        }
        Ok(())
    }

    fn tip_off(&mut self) {
        use rand::Rng;
        let reach = |views: &[PlayerView]| {
            views
                .iter()
                .map(|p| (f32::from(p.attrs.strength) + f32::from(p.attrs.speed)) / 2.0)
                .fold(0.0f32, f32::max)
        };
        let home_reach = reach(&self.court_view(TeamSide::Home));
        let away_reach = reach(&self.court_view(TeamSide::Away));
        let p_home = 1.0 / (1.0 + (-(home_reach - away_reach) * 0.05).exp());
        self.next_offense = if self.rng.gen::<f32>() < p_home {
            TeamSide::Home
        } else {
            TeamSide::Away
        };
    }

    fn quarter_break(&mut self, halftime: bool, host: &mut EffectHost) {
        let recovery = if halftime {
            self.stamina_model.halftime_recovery
        } else {
            self.stamina_model.quarter_recovery
        };
        for side in [TeamSide::Home, TeamSide::Away] {
            let roster: Vec<String> =
                self.team(side).roster.all().map(|c| c.id.clone()).collect();
            let active: Vec<String> = self.active_ids(side);
            for id in roster {
                let factor = if active.contains(&id) {
                    1.0
                } else {
                    self.stamina_model.bench_recovery_factor
                };
                self.state.adjust_stamina(&id, recovery * factor);
            }
        }
        if halftime {
            if self.params.substitution_at_halftime {
                self.fixed_substitution(TeamSide::Home);
                self.fixed_substitution(TeamSide::Away);
            }
            let outcome = self.fire_sim_hook(HookPoint::Halftime, self.next_offense, host);
            self.notes.extend(outcome.narrative);
        }
        if self.params.fatigue_sub_enabled {
            self.fatigue_substitutions(TeamSide::Home);
            self.fatigue_substitutions(TeamSide::Away);
        }
    }

    /// Day-one policy: one fixed swap at the halfway break, most
    /// fatigued starter out, freshest bench competitor in.
    fn fixed_substitution(&mut self, side: TeamSide) {
        let roster_ids: Vec<String> =
            self.team(side).roster.all().map(|c| c.id.clone()).collect();
        if roster_ids.len() <= crate::models::STARTERS_ON_COURT {
            return;
        }
        let active = self.state.active[side.index()].clone();
        let tired_slot = (0..active.len())
            .min_by(|&a, &b| {
                let sa = self.state.stamina_of(&roster_ids[active[a]]);
                let sb = self.state.stamina_of(&roster_ids[active[b]]);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        let fresh_bench = (0..roster_ids.len())
            .filter(|index| !active.contains(index))
            .max_by(|&a, &b| {
                let sa = self.state.stamina_of(&roster_ids[a]);
                let sb = self.state.stamina_of(&roster_ids[b]);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some(bench_index) = fresh_bench {
            let out_index = active[tired_slot];
            let bench_stamina = self.state.stamina_of(&roster_ids[bench_index]);
            let out_stamina = self.state.stamina_of(&roster_ids[out_index]);
            if bench_stamina > out_stamina {
                self.state.active[side.index()][tired_slot] = bench_index;
                let team_id = self.team(side).id.clone();
                self.notes.push(format!(
                    "substitution ({}): {} in for {}",
                    team_id, roster_ids[bench_index], roster_ids[out_index]
                ));
            }
        }
    }

    /// Separately configurable policy: at every break, anyone under the
    /// threshold comes out if a fresher body is available.
    fn fatigue_substitutions(&mut self, side: TeamSide) {
        let roster_ids: Vec<String> =
            self.team(side).roster.all().map(|c| c.id.clone()).collect();
        if roster_ids.len() <= crate::models::STARTERS_ON_COURT {
            return;
        }
        for slot in 0..crate::models::STARTERS_ON_COURT {
            let active = self.state.active[side.index()].clone();
            let out_index = active[slot];
            let out_stamina = self.state.stamina_of(&roster_ids[out_index]);
            if out_stamina >= self.params.fatigue_sub_threshold {
                continue;
            }
            let replacement = (0..roster_ids.len())
                .filter(|index| !active.contains(index))
                .max_by(|&a, &b| {
                    let sa = self.state.stamina_of(&roster_ids[a]);
                    let sb = self.state.stamina_of(&roster_ids[b]);
                    sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
                });
            if let Some(bench_index) = replacement {
                if self.state.stamina_of(&roster_ids[bench_index]) > out_stamina {
                    self.state.active[side.index()][slot] = bench_index;
                    let team_id = self.team(side).id.clone();
                    self.notes.push(format!(
                        "fatigue substitution ({}): {} in for {}",
                        team_id, roster_ids[bench_index], roster_ids[out_index]
                    ));
                }
            }
        }
    }

    fn flush_period(&mut self, period: u8) {
        let home = self.state.score[0] - self.period_start[0];
        let away = self.state.score[1] - self.period_start[1];
        self.period_scores.push(PeriodScore { period, home, away });
        self.period_start = self.state.score;
    }

    /// Budget left for regulation and the target chase; the remainder of
    /// the cap is reserved for sudden death.
    fn chase_cap(&self) -> u32 {
        self.params.possession_cap.saturating_sub(SUDDEN_DEATH_RESERVE)
    }

    pub(crate) fn team(&self, side: TeamSide) -> &Team {
        match side {
            TeamSide::Home => self.home,
            TeamSide::Away => self.away,
        }
    }

    pub(crate) fn active_ids(&self, side: TeamSide) -> Vec<String> {
        let roster: Vec<&Competitor> = self.team(side).roster.all().collect();
        self.state.active[side.index()]
            .iter()
            .map(|&index| roster[index].id.clone())
            .collect()
    }

    pub(crate) fn court_view(&self, side: TeamSide) -> Vec<PlayerView> {
        let roster: Vec<&Competitor> = self.team(side).roster.all().collect();
        self.state.active[side.index()]
            .iter()
            .map(|&index| {
                let competitor = roster[index];
                PlayerView {
                    id: competitor.id.clone(),
                    attrs: competitor.attributes,
                    stamina: self.state.stamina_of(&competitor.id),
                }
            })
            .collect()
    }

    fn sim_context(&self, offense: TeamSide) -> SimContext {
        SimContext {
            home_team_id: self.home.id.clone(),
            away_team_id: self.away.id.clone(),
            offense,
            score: self.state.score,
            quarter: self.state.quarter,
            possession: self.state.possession,
            endgame_active: self.state.endgame_active(),
            rule_version: self.rule_version,
            active: [
                self.active_ids(TeamSide::Home),
                self.active_ids(TeamSide::Away),
            ],
        }
    }

    /// Dispatch a simulation hook and apply the merged score and stamina
    /// deltas atomically. Narrative, the probability delta and the block
    /// flag are left to the caller, whose handling depends on the hook.
    pub(crate) fn fire_sim_hook(
        &mut self,
        hook: HookPoint,
        offense: TeamSide,
        host: &mut EffectHost,
    ) -> HookOutcome {
        let ctx = self.sim_context(offense);
        let outcome = host.dispatch(hook, &HookContext::Sim(&ctx));
        for (index, delta) in outcome.score_delta.iter().enumerate() {
            if *delta != 0 {
                self.state.score[index] = (self.state.score[index] + delta).max(0);
            }
        }
        for (id, delta) in &outcome.stamina_delta {
            self.state.adjust_stamina(id, *delta);
        }
        outcome
    }

    pub(crate) fn stats_mut(&mut self, id: &str) -> &mut BoxScore {
        self.box_scores
            .entry(id.to_string())
            .or_insert_with(|| BoxScore {
                competitor_id: id.to_string(),
                ..BoxScore::default()
            })
    }

    fn into_result(self) -> GameResult {
        GameResult {
            seed: self.seed,
            home_team_id: self.home.id.clone(),
            away_team_id: self.away.id.clone(),
            score: self.state.score,
            period_scores: self.period_scores,
            endgame_target: self.state.endgame_target().unwrap_or_default(),
            total_possessions: self.state.possession,
            possessions: self.records,
            box_scores: self.box_scores,
            notes: self.notes,
        }
    }
}
