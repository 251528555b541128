//! Round execution.
//!
//! One round runs a list of matchups under a shared rule snapshot and a
//! shared [`EffectHost`], single-threaded. Each game's failure is its
//! own: a contract violation or internal error is logged, the matchup is
//! marked skipped and the siblings proceed. At round end the runner
//! ticks effect lifetimes, fires the report hooks and hands the caller
//! everything the excluded storage layers need to flush: results,
//! expired effect ids and the metadata dirty set.
//!
//! Seeds arrive from the caller, one per matchup; upstream derives them
//! as `hash(season, round, matchup, rules)`. This core only consumes
//! the integers.

use serde::{Deserialize, Serialize};

use crate::config::RuleSet;
use crate::effects::{
    EffectHost, EffectId, HookContext, HookPoint, MetaKey, MetaValue, ReportContext, RoundContext,
};
use crate::engine::simulate_game_with_effects;
use crate::models::{GameResult, Team};

#[derive(Debug, Clone, Copy)]
pub struct Matchup<'a> {
    pub home: &'a Team,
    pub away: &'a Team,
    /// Deterministic seed supplied by the upstream scheduler.
    pub seed: u64,
}

#[derive(Debug)]
pub struct RoundInput<'a> {
    pub season_id: &'a str,
    pub round_number: u32,
    pub rules: &'a RuleSet,
    pub matchups: Vec<Matchup<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedGame {
    pub matchup_index: usize,
    pub reason: String,
}

/// Payload the report hooks run over, handed onward to the excluded
/// rendering layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub season_id: String,
    pub round_number: u32,
    pub lines: Vec<String>,
}

#[derive(Debug)]
pub struct RoundOutcome {
    pub results: Vec<GameResult>,
    pub skipped: Vec<SkippedGame>,
    /// Ids that expired this round; the caller appends the matching
    /// events to the durable log.
    pub expired_effects: Vec<EffectId>,
    /// Drained dirty set for the persistence flush.
    pub metadata_dirty: Vec<(MetaKey, MetaValue)>,
    pub report: RoundReport,
}

pub fn run_round(input: &RoundInput<'_>, host: &mut EffectHost) -> RoundOutcome {
    let mut results: Vec<GameResult> = Vec::new();
    let mut skipped = Vec::new();

    for (matchup_index, matchup) in input.matchups.iter().enumerate() {
        match simulate_game_with_effects(
            matchup.home,
            matchup.away,
            input.rules,
            matchup.seed,
            host,
        ) {
            Ok(result) => {
                let ctx = RoundContext {
                    season_id: input.season_id,
                    round_number: input.round_number,
                    results: &results,
                    current: Some(&result),
                };
                let outcome = host.dispatch(HookPoint::PostGame, &HookContext::Round(ctx));
                let mut result = result;
                result.notes.extend(outcome.narrative);
                results.push(result);
            }
            Err(error) => {
                log::error!(
                    "round {} matchup {} ({} vs {}): game skipped: {}",
                    input.round_number,
                    matchup_index,
                    matchup.home.id,
                    matchup.away.id,
                    error
                );
                skipped.push(SkippedGame {
                    matchup_index,
                    reason: error.to_string(),
                });
            }
        }
    }

    let mut report = RoundReport {
        season_id: input.season_id.to_string(),
        round_number: input.round_number,
        lines: results
            .iter()
            .map(|game| {
                format!(
                    "{} {} : {} {}",
                    game.home_team_id, game.score[0], game.score[1], game.away_team_id
                )
            })
            .collect(),
    };
    let ctx = ReportContext {
        season_id: input.season_id,
        round_number: input.round_number,
        lines: &report.lines,
    };
    let outcome = host.dispatch(HookPoint::PreReport, &HookContext::Report(ctx));
    report.lines.extend(outcome.narrative);

    // Tick after every hook of the round so expiring effects still saw
    // the whole round they were active for.
    let expired_effects = host.registry.tick(input.round_number);
    let metadata_dirty = host.metadata.drain_dirty();

    log::info!(
        "round {}: {} game(s) simulated, {} skipped, {} effect(s) expired",
        input.round_number,
        results.len(),
        skipped.len(),
        expired_effects.len()
    );

    RoundOutcome {
        results,
        skipped,
        expired_effects,
        metadata_dirty,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectAction, EffectDuration, EntityRef, MetaOp, RegisteredEffect};
    use crate::models::{Attributes, Competitor, Roster, Team};

    fn team(id: &str, spread: [u8; 9]) -> Team {
        let attrs = Attributes::build(spread, spread.iter().map(|&v| u32::from(v)).sum())
            .unwrap();
        let competitor = |suffix: &str| {
            Competitor::new(format!("{id}-{suffix}"), format!("{id} {suffix}"), attrs).unwrap()
        };
        Team::new(
            id,
            id.to_uppercase(),
            Roster::new(
                vec![competitor("1"), competitor("2"), competitor("3")],
                vec![competitor("4")],
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn broken_team(id: &str) -> Team {
        let mut team = team(id, [55; 9]);
        team.roster.starters[0].attributes.speed = 0;
        team
    }

    #[test]
    fn one_bad_matchup_does_not_stop_the_round() {
        let rules = RuleSet::league_default();
        let alpha = team("alpha", [55; 9]);
        let beta = team("beta", [52; 9]);
        let gamma = broken_team("gamma");
        let input = RoundInput {
            season_id: "s1",
            round_number: 3,
            rules: &rules,
            matchups: vec![
                Matchup { home: &alpha, away: &beta, seed: 11 },
                Matchup { home: &gamma, away: &beta, seed: 12 },
                Matchup { home: &beta, away: &alpha, seed: 13 },
            ],
        };
        let mut host = EffectHost::default();
        let outcome = run_round(&input, &mut host);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].matchup_index, 1);
        assert!(outcome.skipped[0].reason.contains("contract violation"));
    }

    #[test]
    fn round_outputs_expired_ids_and_dirty_metadata() {
        let rules = RuleSet::league_default();
        let alpha = team("alpha", [55; 9]);
        let beta = team("beta", [52; 9]);
        let mut host = EffectHost::default();
        host.registry.register(RegisteredEffect {
            id: "count-games".into(),
            proposal_id: "prop-1".into(),
            hooks: vec![HookPoint::PostGame],
            conditions: vec![],
            action: EffectAction::Metadata {
                target: EntityRef::WinningTeam,
                field: "wins_counted".into(),
                op: MetaOp::Increment(MetaValue::Int(1)),
            },
            duration: EffectDuration::Rounds(1),
            priority: 0,
            registered_round: 7,
            seq: 0,
            fired: false,
        });
        let input = RoundInput {
            season_id: "s1",
            round_number: 7,
            rules: &rules,
            matchups: vec![Matchup { home: &alpha, away: &beta, seed: 21 }],
        };
        let outcome = run_round(&input, &mut host);
        assert_eq!(outcome.results.len(), 1);
        // The one-round effect expired with this round's tick.
        assert_eq!(outcome.expired_effects, vec!["count-games".to_string()]);
        // Its metadata write is in the dirty set exactly once.
        assert_eq!(outcome.metadata_dirty.len(), 1);
        assert_eq!(outcome.metadata_dirty[0].1, MetaValue::Int(1));
        // Report carries one line per completed game.
        assert_eq!(outcome.report.lines.len(), 1);
    }

    #[test]
    fn report_hooks_can_append_lines() {
        let rules = RuleSet::league_default();
        let alpha = team("alpha", [55; 9]);
        let beta = team("beta", [52; 9]);
        let mut host = EffectHost::default();
        host.registry.register(RegisteredEffect {
            id: "signoff".into(),
            proposal_id: "prop-2".into(),
            hooks: vec![HookPoint::PreReport],
            conditions: vec![],
            action: EffectAction::Narrative {
                text: "brought to you by the commissioner".into(),
            },
            duration: EffectDuration::Permanent,
            priority: 0,
            registered_round: 1,
            seq: 0,
            fired: false,
        });
        let input = RoundInput {
            season_id: "s1",
            round_number: 2,
            rules: &rules,
            matchups: vec![Matchup { home: &alpha, away: &beta, seed: 5 }],
        };
        let outcome = run_round(&input, &mut host);
        assert_eq!(
            outcome.report.lines.last().unwrap(),
            "brought to you by the commissioner"
        );
    }
}
