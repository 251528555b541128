//! Possession state machine.
//!
//! SETUP -> TRANSITION_CHECK -> {FAST_BREAK | HALF_COURT} -> repeated
//! action select (shoot / pass / drive) -> REBOUND on a miss or
//! FREE_THROWS on a shooting foul -> STAMINA_DRAIN -> possession end.
//! Shot-clock expiry forces a low-probability heave regardless of the
//! chosen action. Every terminal branch writes exactly one
//! `PossessionRecord`.

use rand::Rng;

use crate::effects::{EffectHost, HookPoint};
use crate::error::Result;
use crate::models::{ActionKind, PossessionOutcome, PossessionRecord, TeamSide, TurnoverKind};

use super::defense::{self, DefensiveCall, SchemeInputs};
use super::probability::{self, ShotKind};
use super::state::PlayerView;
use super::GameEngine;

/// Hard bound on inner iterations of one possession. Offensive rebounds
/// reset the shot clock but never this counter, so a possession always
/// terminates.
const MAX_POSSESSION_ITERATIONS: u32 = 12;

/// Offense boards carry this discount against the defense's position.
const OFFENSIVE_REBOUND_DISCOUNT: f32 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PossessionPhase {
    Regulation,
    Endgame,
    SuddenDeath,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PossessionDigest {
    pub offense: TeamSide,
    pub points: u32,
}

enum ShotResolution {
    Made,
    Missed,
    Fouled,
}

/// Which defender rotates onto the attacker. Man-marking inverts the
/// assignment; zones send the best-suited tool.
fn contest_slot(
    call: &DefensiveCall,
    def_view: &[PlayerView],
    attacker_slot: usize,
    kind: ShotKind,
) -> usize {
    if let Some(assignment) = call.assignment {
        if let Some(slot) = assignment.iter().position(|&mark| mark == attacker_slot) {
            return slot;
        }
    }
    let best_by = |pick: fn(&PlayerView) -> u8| {
        (0..def_view.len())
            .max_by_key(|&index| pick(&def_view[index]))
            .unwrap_or(0)
    };
    match kind {
        ShotKind::Drive | ShotKind::FastBreak => best_by(|p| p.attrs.interior_defense),
        _ => best_by(|p| p.attrs.perimeter_defense),
    }
}

impl GameEngine<'_> {
    pub(crate) fn run_possession(
        &mut self,
        host: &mut EffectHost,
        phase: PossessionPhase,
    ) -> Result<PossessionDigest> {
        let offense = self.next_offense;
        let defense = offense.other();
        self.next_offense = defense;
        self.state.possession += 1;
        let index = self.state.possession;

        // Hook first so effect score/stamina changes shape this
        // possession, then snapshot the floor.
        let outcome = self.fire_sim_hook(HookPoint::PossessionStart, offense, host);
        let mut tags = outcome.narrative.clone();
        let shot_delta = outcome.shot_prob_delta;
        if phase == PossessionPhase::SuddenDeath {
            tags.push("sudden-death".to_string());
        }

        let off_view = self.court_view(offense);
        let def_view = self.court_view(defense);
        if off_view.len() != 3 || def_view.len() != 3 {
            return Err(crate::error::SimError::Internal {
                possession: index,
                message: format!(
                    "active lists hold {}/{} competitors",
                    off_view.len(),
                    def_view.len()
                ),
            });
        }
        for view in off_view.iter().chain(def_view.iter()) {
            self.stats_mut(&view.id).possessions_played += 1;
        }

        if outcome.block_default {
            tags.push("voided".to_string());
            self.drain_floor(&off_view, &def_view, false, false);
            let record = PossessionRecord {
                index,
                period: self.state.quarter,
                offense,
                action: ActionKind::Stoppage,
                outcome: PossessionOutcome::Stopped,
                scorer: None,
                defender: None,
                points: 0,
                tags,
            };
            self.finish_possession(record, offense, host)?;
            return Ok(PossessionDigest { offense, points: 0 });
        }

        // Defensive call for the possession.
        let margin = self.state.score[defense.index()] - self.state.score[offense.index()];
        let inputs =
            SchemeInputs::gather(&off_view, &def_view, margin, self.state.endgame_active());
        let scheme = defense::select_scheme(&inputs, self.seed, index, defense);
        let assignment = scheme.is_man_marking().then(|| {
            let context_weight = if self.state.endgame_active() { 0.8 } else { 0.45 };
            defense::assign_marks(&def_view, &off_view, context_weight)
        });
        let call = DefensiveCall { scheme, assignment };
        self.state.defense_call = Some(call.clone());
        let pressing = scheme.is_press();

        let mut pressure: f32 = 0.25;
        if pressing {
            pressure += 0.25;
        }
        if self.state.endgame_active() {
            pressure += 0.2;
        }
        let pressure = pressure.min(1.0);

        let half = self.state.half_index(self.params.quarter_count);

        // Possession-local bookkeeping.
        let mut possession_points: u32 = 0;
        let mut scorer: Option<String> = None;
        let mut credited_defender: Option<String> = None;
        let mut extra_off = [0.0f32; 3];
        let mut extra_def = [0.0f32; 3];
        let mut fast_break_ran = false;

        // Setup: the best playmaker usually brings it up.
        let playmaking_weights: Vec<f32> = off_view
            .iter()
            .map(|p| f32::from(p.attrs.playmaking))
            .collect();
        let mut handler = self.weighted_pick(&playmaking_weights);
        let mut pending_assist: Option<usize> = None;
        let mut actions_left = self.params.shot_clock_actions;
        let mut iterations: u32 = 0;

        // Transition check. A press gambles; beating it runs the break.
        let avg_speed = |views: &[PlayerView]| {
            views.iter().map(|p| f32::from(p.attrs.speed)).sum::<f32>() / views.len() as f32
        };
        let speed_edge = (avg_speed(&off_view) - avg_speed(&def_view)) / 100.0;
        let fast_break_chance =
            (0.08 + speed_edge.max(0.0) * 0.6 + if pressing { 0.07 } else { 0.0 })
                .clamp(0.02, 0.35);
        let mut forced_kind: Option<ShotKind> = None;
        if self.rng.gen::<f32>() < fast_break_chance {
            fast_break_ran = true;
            tags.push("fast-break".to_string());
            // The fastest attacker finishes the break.
            handler = (0..off_view.len())
                .max_by_key(|&slot| off_view[slot].attrs.speed)
                .unwrap_or(handler);
            pending_assist = None;
            forced_kind = Some(ShotKind::FastBreak);
        }

        let (action_final, outcome_final) = loop {
            iterations += 1;
            let clock_expired = actions_left == 0 || iterations >= MAX_POSSESSION_ITERATIONS;

            // Decide what this touch is.
            let kind = if let Some(kind) = forced_kind.take() {
                kind
            } else if clock_expired {
                tags.push("shot-clock".to_string());
                ShotKind::ForcedHeave
            } else {
                let view = &off_view[handler];
                let w_shoot =
                    f32::from(view.attrs.shooting) * 0.8 + f32::from(view.attrs.finishing) * 0.4;
                let w_drive =
                    f32::from(view.attrs.finishing) * 0.7 + f32::from(view.attrs.speed) * 0.5;
                let w_pass = f32::from(view.attrs.playmaking)
                    * if actions_left > 1 { 1.1 } else { 0.2 };
                match self.weighted_pick(&[w_shoot, w_drive, w_pass]) {
                    0 => {
                        // Range by shot diet.
                        let sh = f32::from(view.attrs.shooting);
                        let fin = f32::from(view.attrs.finishing);
                        let p_three = (sh / (sh + fin)).clamp(0.2, 0.75);
                        if self.rng.gen::<f32>() < p_three {
                            ShotKind::Three
                        } else {
                            ShotKind::MidRange
                        }
                    }
                    1 => ShotKind::Drive,
                    _ => {
                        // Pass. The handler's marker hounds the ball.
                        let marker = contest_slot(&call, &def_view, handler, ShotKind::MidRange);
                        let turnover_p = probability::turnover_probability(
                            &off_view[handler].attrs,
                            &def_view[marker].attrs,
                            off_view[handler].stamina,
                            pressing,
                            self.params.turnover_scale,
                        );
                        extra_off[handler] += self.stamina_model.pass_cost;
                        if self.rng.gen::<f32>() < turnover_p {
                            self.stats_mut(&off_view[handler].id).turnovers += 1;
                            let kind = if self.rng.gen::<f32>() < 0.65 {
                                self.stats_mut(&def_view[marker].id).steals += 1;
                                credited_defender = Some(def_view[marker].id.clone());
                                TurnoverKind::Steal
                            } else {
                                TurnoverKind::OutOfBounds
                            };
                            break (ActionKind::Pass, PossessionOutcome::Turnover { kind });
                        }
                        let mut receiver_weights = [0.0f32; 3];
                        for (slot, view) in off_view.iter().enumerate() {
                            if slot != handler {
                                receiver_weights[slot] = f32::from(view.attrs.shooting)
                                    + f32::from(view.attrs.finishing);
                            }
                        }
                        let receiver = self.weighted_pick(&receiver_weights);
                        pending_assist = Some(handler);
                        handler = receiver;
                        actions_left = actions_left.saturating_sub(1);
                        continue;
                    }
                }
            };

            // A drive can die before the shot: strip or charge.
            if kind == ShotKind::Drive {
                pending_assist = None;
                extra_off[handler] += self.stamina_model.drive_cost;
                let marker = contest_slot(&call, &def_view, handler, ShotKind::Drive);
                let strip_p = probability::turnover_probability(
                    &off_view[handler].attrs,
                    &def_view[marker].attrs,
                    off_view[handler].stamina,
                    pressing,
                    self.params.turnover_scale,
                ) * 0.8;
                if self.rng.gen::<f32>() < strip_p {
                    self.stats_mut(&off_view[handler].id).turnovers += 1;
                    self.stats_mut(&def_view[marker].id).steals += 1;
                    credited_defender = Some(def_view[marker].id.clone());
                    break (
                        ActionKind::Drive,
                        PossessionOutcome::Turnover {
                            kind: TurnoverKind::Steal,
                        },
                    );
                }
                let charge_p = 0.03 * self.params.foul_rate_scale;
                if self.rng.gen::<f32>() < charge_p {
                    self.stats_mut(&off_view[handler].id).turnovers += 1;
                    self.stats_mut(&off_view[handler].id).fouls += 1;
                    credited_defender = Some(def_view[marker].id.clone());
                    break (
                        ActionKind::Drive,
                        PossessionOutcome::Turnover {
                            kind: TurnoverKind::OffensiveFoul,
                        },
                    );
                }
            }

            // The shot attempt itself.
            let action = action_kind(kind);
            let defender_slot = contest_slot(&call, &def_view, handler, kind);
            let shooter = off_view[handler].clone();
            let defender = def_view[defender_slot].clone();
            extra_off[handler] += self.stamina_model.shot_cost;
            extra_def[defender_slot] += self.stamina_model.contest_cost;

            match self.attempt_shot(&shooter, &defender, kind, pressure, shot_delta) {
                ShotResolution::Fouled => {
                    self.state.team_fouls[defense.index()][half] += 1;
                    self.stats_mut(&defender.id).fouls += 1;
                    credited_defender = Some(defender.id.clone());

                    // Most drive whistles come in the act; the rest are
                    // on the floor and only shoot in the bonus.
                    let in_the_act = kind != ShotKind::Drive || self.rng.gen::<f32>() < 0.7;
                    if !in_the_act {
                        let in_bonus = self.state.team_fouls[defense.index()][half]
                            >= u16::from(self.params.bonus_foul_threshold);
                        if !in_bonus {
                            // Side out, fresh clock.
                            tags.push("reset".to_string());
                            actions_left = self.params.shot_clock_actions;
                            pending_assist = None;
                            continue;
                        }
                        tags.push("bonus".to_string());
                    }

                    let attempts = if in_the_act && kind.is_three() { 3 } else { 2 };
                    extra_off[handler] += self.stamina_model.free_throw_cost;
                    let (made, last_missed) = self.resolve_free_throws(&shooter, attempts);
                    if made > 0 {
                        let points = made * self.params.free_throw_value;
                        possession_points += points;
                        self.state.score[offense.index()] += i64::from(points);
                        self.stats_mut(&shooter.id).points += points;
                        scorer = Some(shooter.id.clone());
                    }
                    if last_missed {
                        let (offensive, slot) = self.resolve_rebound(&off_view, &def_view);
                        if offensive && iterations < MAX_POSSESSION_ITERATIONS {
                            tags.push("putback".to_string());
                            handler = slot;
                            pending_assist = None;
                            actions_left = self.params.shot_clock_actions;
                            continue;
                        }
                    }
                    break (action, PossessionOutcome::FreeThrows { made, attempts });
                }
                ShotResolution::Made => {
                    let assisted = pending_assist.is_some() && kind != ShotKind::FastBreak;
                    self.record_shot_attempt(&shooter.id, kind, true);
                    let points = self.shot_points(kind);
                    possession_points += points;
                    self.state.score[offense.index()] += i64::from(points);
                    self.stats_mut(&shooter.id).points += points;
                    scorer = Some(shooter.id.clone());
                    credited_defender = Some(defender.id.clone());
                    if assisted {
                        if let Some(passer) = pending_assist {
                            self.stats_mut(&off_view[passer].id).assists += 1;
                        }
                    }
                    break (action, PossessionOutcome::Made { points, assisted });
                }
                ShotResolution::Missed => {
                    self.record_shot_attempt(&shooter.id, kind, false);
                    credited_defender = Some(defender.id.clone());
                    let (offensive, slot) = self.resolve_rebound(&off_view, &def_view);
                    if offensive && iterations < MAX_POSSESSION_ITERATIONS {
                        tags.push("putback".to_string());
                        handler = slot;
                        pending_assist = None;
                        actions_left = self.params.shot_clock_actions;
                        continue;
                    }
                    break (action, PossessionOutcome::Missed);
                }
            }
        };

        self.drain_floor(&off_view, &def_view, fast_break_ran, pressing);
        for (slot, view) in off_view.iter().enumerate() {
            self.state.adjust_stamina(&view.id, -extra_off[slot]);
        }
        for (slot, view) in def_view.iter().enumerate() {
            self.state.adjust_stamina(&view.id, -extra_def[slot]);
        }

        let record = PossessionRecord {
            index,
            period: self.state.quarter,
            offense,
            action: action_final,
            outcome: outcome_final,
            scorer,
            defender: credited_defender,
            points: possession_points,
            tags,
        };
        self.finish_possession(record, offense, host)?;
        Ok(PossessionDigest {
            offense,
            points: possession_points,
        })
    }

    /// Fire `PossessionEnd`, fold its narrative into the record's tags,
    /// then commit the record.
    fn finish_possession(
        &mut self,
        mut record: PossessionRecord,
        offense: TeamSide,
        host: &mut EffectHost,
    ) -> Result<()> {
        let outcome = self.fire_sim_hook(HookPoint::PossessionEnd, offense, host);
        record.tags.extend(outcome.narrative);
        self.records.push(record);
        Ok(())
    }

    fn attempt_shot(
        &mut self,
        shooter: &PlayerView,
        defender: &PlayerView,
        kind: ShotKind,
        pressure: f32,
        shot_delta: f32,
    ) -> ShotResolution {
        let foul_p =
            probability::foul_probability(&defender.attrs, kind, self.params.foul_rate_scale);
        if self.rng.gen::<f32>() < foul_p {
            return ShotResolution::Fouled;
        }
        let p = probability::shot_probability(
            &shooter.attrs,
            &defender.attrs,
            kind,
            shooter.stamina,
            pressure,
            self.params.shot_probability_scale,
            shot_delta,
        );
        if self.rng.gen::<f32>() < p {
            ShotResolution::Made
        } else {
            ShotResolution::Missed
        }
    }

    fn resolve_free_throws(&mut self, shooter: &PlayerView, attempts: u32) -> (u32, bool) {
        let p = probability::free_throw_probability(&shooter.attrs, shooter.stamina);
        let mut made = 0;
        let mut last_missed = false;
        for _ in 0..attempts {
            let hit = self.rng.gen::<f32>() < p;
            if hit {
                made += 1;
            }
            last_missed = !hit;
        }
        let stats = self.stats_mut(&shooter.id);
        stats.free_throws_attempted += attempts;
        stats.free_throws_made += made;
        (made, last_missed)
    }

    /// Board battle. Returns whether the offense kept it and which slot
    /// of the winning side came down with the ball.
    fn resolve_rebound(
        &mut self,
        off_view: &[PlayerView],
        def_view: &[PlayerView],
    ) -> (bool, usize) {
        let pull = |views: &[PlayerView]| -> Vec<f32> {
            views
                .iter()
                .map(|p| probability::rebound_weight(&p.attrs, p.stamina))
                .collect()
        };
        let off_weights = pull(off_view);
        let def_weights = pull(def_view);
        let off_total: f32 = off_weights.iter().sum::<f32>() * OFFENSIVE_REBOUND_DISCOUNT;
        let def_total: f32 = def_weights.iter().sum();
        let p_offense = off_total / (off_total + def_total).max(1e-6);
        let offensive = self.rng.gen::<f32>() < p_offense;
        let (views, weights) = if offensive {
            (off_view, off_weights)
        } else {
            (def_view, def_weights)
        };
        let slot = self.weighted_pick(&weights);
        self.stats_mut(&views[slot].id).rebounds += 1;
        (offensive, slot)
    }

    fn drain_floor(
        &mut self,
        off_view: &[PlayerView],
        def_view: &[PlayerView],
        fast_break: bool,
        pressing: bool,
    ) {
        let base = self.stamina_model.base_drain
            + if fast_break {
                self.stamina_model.fastbreak_drain
            } else {
                0.0
            };
        for view in off_view {
            self.state.adjust_stamina(&view.id, -base);
        }
        let press_cost = if pressing {
            self.stamina_model.press_cost
        } else {
            0.0
        };
        for view in def_view {
            self.state.adjust_stamina(&view.id, -(base + press_cost));
        }
    }

    fn record_shot_attempt(&mut self, id: &str, kind: ShotKind, made: bool) {
        let is_three = kind.is_three();
        let stats = self.stats_mut(id);
        stats.field_goals_attempted += 1;
        if is_three {
            stats.threes_attempted += 1;
        }
        if made {
            stats.field_goals_made += 1;
            if is_three {
                stats.threes_made += 1;
            }
        }
    }

    fn shot_points(&self, kind: ShotKind) -> u32 {
        if kind.is_three() {
            self.params.three_point_value
        } else {
            self.params.two_point_value
        }
    }

    fn weighted_pick(&mut self, weights: &[f32]) -> usize {
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return 0;
        }
        let mut roll = self.rng.gen::<f32>() * total;
        for (index, weight) in weights.iter().enumerate() {
            if roll < *weight {
                return index;
            }
            roll -= weight;
        }
        weights.len() - 1
    }
}

fn action_kind(kind: ShotKind) -> ActionKind {
    match kind {
        ShotKind::Three => ActionKind::ThreePointShot,
        ShotKind::MidRange => ActionKind::MidRangeShot,
        ShotKind::Drive => ActionKind::Drive,
        ShotKind::FastBreak => ActionKind::FastBreak,
        ShotKind::ForcedHeave => ActionKind::ForcedHeave,
    }
}
