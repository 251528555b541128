//! The pluggable effect layer.
//!
//! [`EffectHost`] bundles the two round-scoped stores, the effect
//! registry and the metadata cache, and runs hook dispatch against them.
//! The host is hydrated once at round start, mutated only by the single
//! thread running that round, and its outputs (expired ids, dirty
//! metadata) are flushed once at round end.
//!
//! ## Dispatch
//!
//! At each hook firing, every active effect attached to that hook whose
//! condition clauses all hold is applied, in the registry's fixed firing
//! order. Results merge additively into one [`HookOutcome`] the engine
//! applies atomically. An effect that errors is logged and isolated; the
//! rest still apply and default behavior still proceeds.
//!
//! ## Chaining
//!
//! Metadata written by an effect can satisfy another effect's condition
//! at the same firing. The dispatcher re-evaluates effects that have not
//! yet fired and runs the newly eligible ones one level deeper. Depth is
//! counted per trigger chain and capped at [`CHAIN_DEPTH_LIMIT`] levels;
//! links past the cap are suppressed and logged.

pub mod effect;
pub mod hooks;
pub mod metadata;
pub mod registry;

pub use effect::{
    ActionPrimitive, Comparison, ConditionClause, EffectAction, EffectDuration, EffectError,
    EffectId, EntityRef, MetaOp, RegisteredEffect,
};
pub use hooks::{
    HookContext, HookOutcome, HookPhase, HookPoint, ReportContext, RoundContext, SimContext,
};
pub use metadata::{EntityKind, MetaKey, MetadataError, MetadataStore, MetaValue};
pub use registry::{EffectEvent, EffectRegistry};

use crate::models::TeamSide;

/// Maximum levels in one trigger chain. The initial firing is level 1.
pub const CHAIN_DEPTH_LIMIT: usize = 3;

#[derive(Debug, Default)]
pub struct EffectHost {
    pub registry: EffectRegistry,
    pub metadata: MetadataStore,
}

impl EffectHost {
    pub fn new(registry: EffectRegistry, metadata: MetadataStore) -> Self {
        Self { registry, metadata }
    }

    /// Fire one hook and merge every matching effect's output.
    pub fn dispatch(&mut self, hook: HookPoint, ctx: &HookContext<'_>) -> HookOutcome {
        let mut outcome = HookOutcome::default();
        let count = self.registry.len();
        if count == 0 {
            return outcome;
        }
        let mut fired = vec![false; count];
        let mut frontier: Vec<usize> = (0..count)
            .filter(|&index| self.eligible(index, hook, ctx))
            .collect();
        let mut depth = 0;
        while !frontier.is_empty() {
            depth += 1;
            if depth > CHAIN_DEPTH_LIMIT {
                log::warn!(
                    "effect chain depth cap reached at {:?}; suppressing {} effect(s)",
                    hook,
                    frontier.len()
                );
                break;
            }
            let mut wrote_metadata = false;
            for &index in &frontier {
                fired[index] = true;
                let id = self.registry.slot(index).id.clone();
                match self.apply_slot(index, ctx) {
                    Ok((wrote, payload)) => {
                        wrote_metadata |= wrote;
                        outcome.absorb(payload);
                        self.registry.slot_mut(index).note_fired();
                    }
                    Err(error) => {
                        // One failing effect never blocks the others or
                        // the default behavior; its payload is dropped
                        // whole and a single-use effect is not consumed.
                        log::warn!("effect {} failed at {:?}: {}", id, hook, error);
                    }
                }
            }
            if !wrote_metadata {
                break;
            }
            frontier = (0..count)
                .filter(|&index| !fired[index] && self.eligible(index, hook, ctx))
                .collect();
        }
        outcome
    }

    fn eligible(&self, index: usize, hook: HookPoint, ctx: &HookContext<'_>) -> bool {
        let effect = self.registry.slot(index);
        if !effect.attaches_to(hook) {
            return false;
        }
        if effect.duration == EffectDuration::SingleUse && effect.fired {
            return false;
        }
        effect.conditions.iter().all(|clause| {
            let Some((kind, id)) = resolve_entity(ctx, &clause.target) else {
                return false;
            };
            let key = MetaKey::new(kind, id, clause.field.clone());
            match self.metadata.get(&key) {
                Some(stored) => clause.op.evaluate(stored, &clause.value),
                None => false,
            }
        })
    }

    /// Apply one effect into a fresh payload. Returns whether it wrote
    /// metadata, which is what can trigger further chain levels. The
    /// caller merges the payload only on success.
    fn apply_slot(
        &mut self,
        index: usize,
        ctx: &HookContext<'_>,
    ) -> Result<(bool, HookOutcome), EffectError> {
        let action = self.registry.slot(index).action.clone();
        let mut payload = HookOutcome::default();
        let wrote = match action {
            EffectAction::Metadata { target, field, op } => {
                self.write_metadata(ctx, &target, &field, &op)?;
                true
            }
            EffectAction::Callback { steps } => {
                let mut wrote = false;
                for step in &steps {
                    wrote |= self.apply_primitive(step, ctx, &mut payload)?;
                }
                wrote
            }
            EffectAction::Narrative { text } => {
                payload.narrative.push(text);
                false
            }
        };
        Ok((wrote, payload))
    }

    fn apply_primitive(
        &mut self,
        step: &ActionPrimitive,
        ctx: &HookContext<'_>,
        outcome: &mut HookOutcome,
    ) -> Result<bool, EffectError> {
        match step {
            ActionPrimitive::ModifyScore { target, delta } => {
                let side = resolve_side(ctx, target)?;
                outcome.score_delta[side.index()] += delta;
                Ok(false)
            }
            ActionPrimitive::ModifyShotProbability { delta } => {
                outcome.shot_prob_delta += delta;
                Ok(false)
            }
            ActionPrimitive::ModifyStamina { target, delta } => {
                for id in resolve_competitors(ctx, target)? {
                    outcome.stamina_delta.push((id, *delta));
                }
                Ok(false)
            }
            ActionPrimitive::WriteMetadata { target, field, op } => {
                self.write_metadata(ctx, target, field, op)?;
                Ok(true)
            }
            ActionPrimitive::AddNarrative { text } => {
                outcome.narrative.push(text.clone());
                Ok(false)
            }
            ActionPrimitive::BlockDefault => {
                outcome.block_default = true;
                Ok(false)
            }
        }
    }

    fn write_metadata(
        &mut self,
        ctx: &HookContext<'_>,
        target: &EntityRef,
        field: &str,
        op: &MetaOp,
    ) -> Result<(), EffectError> {
        let (kind, id) = resolve_entity(ctx, target)
            .ok_or_else(|| EffectError::UnresolvableTarget(target.clone()))?;
        let key = MetaKey::new(kind, id, field.to_string());
        match op {
            MetaOp::Set(value) => self.metadata.set(key, value.clone()),
            MetaOp::Increment(by) => self.metadata.increment(&key, by)?,
            MetaOp::Decrement(by) => self.metadata.decrement(&key, by)?,
            MetaOp::Toggle => {
                self.metadata.toggle(&key)?;
            }
        }
        Ok(())
    }
}

/// Resolve a symbolic target to a metadata entity for the given context.
/// Returns `None` when the phase cannot know the answer, e.g. the
/// offensive team outside simulation or the leading team in a tie.
pub fn resolve_entity(ctx: &HookContext<'_>, target: &EntityRef) -> Option<(EntityKind, String)> {
    match target {
        EntityRef::League => Some((EntityKind::League, "league".to_string())),
        EntityRef::Team(id) => Some((EntityKind::Team, id.clone())),
        EntityRef::Competitor(id) => Some((EntityKind::Competitor, id.clone())),
        EntityRef::OffensiveTeam | EntityRef::DefensiveTeam => match ctx {
            HookContext::Sim(sim) => {
                let side = if matches!(target, EntityRef::OffensiveTeam) {
                    sim.offense
                } else {
                    sim.offense.other()
                };
                Some((EntityKind::Team, sim.team_id(side).to_string()))
            }
            _ => None,
        },
        EntityRef::HomeTeam | EntityRef::AwayTeam => {
            let want_home = matches!(target, EntityRef::HomeTeam);
            match ctx {
                HookContext::Sim(sim) => {
                    let side = if want_home { TeamSide::Home } else { TeamSide::Away };
                    Some((EntityKind::Team, sim.team_id(side).to_string()))
                }
                HookContext::Round(round) => round.current.map(|game| {
                    let id = if want_home {
                        game.home_team_id.clone()
                    } else {
                        game.away_team_id.clone()
                    };
                    (EntityKind::Team, id)
                }),
                HookContext::Report(_) => None,
            }
        }
        EntityRef::LeadingTeam | EntityRef::TrailingTeam => match ctx {
            HookContext::Sim(sim) => {
                let leader = sim.leader()?;
                let side = if matches!(target, EntityRef::LeadingTeam) {
                    leader
                } else {
                    leader.other()
                };
                Some((EntityKind::Team, sim.team_id(side).to_string()))
            }
            _ => None,
        },
        EntityRef::WinningTeam | EntityRef::LosingTeam => match ctx {
            HookContext::Round(round) => {
                let game = round.current?;
                let winner = game.winner()?;
                let side = if matches!(target, EntityRef::WinningTeam) {
                    winner
                } else {
                    winner.other()
                };
                let id = if side == TeamSide::Home {
                    game.home_team_id.clone()
                } else {
                    game.away_team_id.clone()
                };
                Some((EntityKind::Team, id))
            }
            _ => None,
        },
    }
}

fn resolve_side(ctx: &HookContext<'_>, target: &EntityRef) -> Result<TeamSide, EffectError> {
    let HookContext::Sim(sim) = ctx else {
        return Err(EffectError::UnresolvableTarget(target.clone()));
    };
    let side = match target {
        EntityRef::OffensiveTeam => sim.offense,
        EntityRef::DefensiveTeam => sim.offense.other(),
        EntityRef::HomeTeam => TeamSide::Home,
        EntityRef::AwayTeam => TeamSide::Away,
        EntityRef::LeadingTeam => sim
            .leader()
            .ok_or_else(|| EffectError::UnresolvableTarget(target.clone()))?,
        EntityRef::TrailingTeam => sim
            .leader()
            .ok_or_else(|| EffectError::UnresolvableTarget(target.clone()))?
            .other(),
        EntityRef::Team(id) => {
            if id == &sim.home_team_id {
                TeamSide::Home
            } else if id == &sim.away_team_id {
                TeamSide::Away
            } else {
                return Err(EffectError::UnresolvableTarget(target.clone()));
            }
        }
        _ => return Err(EffectError::UnresolvableTarget(target.clone())),
    };
    Ok(side)
}

fn resolve_competitors(
    ctx: &HookContext<'_>,
    target: &EntityRef,
) -> Result<Vec<String>, EffectError> {
    if let EntityRef::Competitor(id) = target {
        return Ok(vec![id.clone()]);
    }
    let HookContext::Sim(sim) = ctx else {
        return Err(EffectError::UnresolvableTarget(target.clone()));
    };
    let side = resolve_side(ctx, target)?;
    Ok(sim.active[side.index()].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_ctx(offense: TeamSide, score: [i64; 2]) -> SimContext {
        SimContext {
            home_team_id: "home".into(),
            away_team_id: "away".into(),
            offense,
            score,
            quarter: 1,
            possession: 1,
            endgame_active: false,
            rule_version: 0,
            active: [
                vec!["h1".into(), "h2".into(), "h3".into()],
                vec!["a1".into(), "a2".into(), "a3".into()],
            ],
        }
    }

    fn base_effect(id: &str, priority: i32, action: EffectAction) -> RegisteredEffect {
        RegisteredEffect {
            id: id.into(),
            proposal_id: format!("prop-{id}"),
            hooks: vec![HookPoint::PossessionStart],
            conditions: vec![],
            action,
            duration: EffectDuration::Permanent,
            priority,
            registered_round: 1,
            seq: 0,
            fired: false,
        }
    }

    fn gated_writer(id: &str, priority: i32, watch: &str, write: &str) -> RegisteredEffect {
        let mut fx = base_effect(
            id,
            priority,
            EffectAction::Metadata {
                target: EntityRef::OffensiveTeam,
                field: write.into(),
                op: MetaOp::Set(MetaValue::Int(1)),
            },
        );
        fx.conditions = vec![ConditionClause {
            target: EntityRef::OffensiveTeam,
            field: watch.into(),
            op: Comparison::Ge,
            value: MetaValue::Int(1),
        }];
        fx
    }

    #[test]
    fn conditional_gating_respects_threshold() {
        let mut fx = base_effect(
            "gated",
            0,
            EffectAction::Callback {
                steps: vec![ActionPrimitive::ModifyShotProbability { delta: 0.1 }],
            },
        );
        fx.conditions = vec![ConditionClause {
            target: EntityRef::OffensiveTeam,
            field: "momentum".into(),
            op: Comparison::Ge,
            value: MetaValue::Int(5),
        }];
        let mut host = EffectHost::default();
        host.registry.register(fx);

        let ctx = sim_ctx(TeamSide::Home, [0, 0]);
        host.metadata
            .load([(MetaKey::team("home", "momentum"), MetaValue::Int(4))]);
        let outcome = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        assert_eq!(outcome.shot_prob_delta, 0.0, "must not fire at 4");

        host.metadata
            .load([(MetaKey::team("home", "momentum"), MetaValue::Int(5))]);
        let outcome = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        assert!(
            (outcome.shot_prob_delta - 0.1).abs() < 1e-6,
            "must fire at 5"
        );
    }

    #[test]
    fn chain_of_four_resolves_only_three() {
        let mut host = EffectHost::default();
        // Seed effect writes f1; each later effect watches the previous
        // field and writes the next.
        host.registry.register(base_effect(
            "e1",
            0,
            EffectAction::Metadata {
                target: EntityRef::OffensiveTeam,
                field: "f1".into(),
                op: MetaOp::Set(MetaValue::Int(1)),
            },
        ));
        host.registry.register(gated_writer("e2", 1, "f1", "f2"));
        host.registry.register(gated_writer("e3", 2, "f2", "f3"));
        host.registry.register(gated_writer("e4", 3, "f3", "f4"));

        let ctx = sim_ctx(TeamSide::Home, [0, 0]);
        host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));

        let f3 = MetaKey::team("home", "f3");
        let f4 = MetaKey::team("home", "f4");
        assert_eq!(host.metadata.get(&f3), Some(&MetaValue::Int(1)));
        assert_eq!(host.metadata.get(&f4), None, "fourth link must be suppressed");
    }

    #[test]
    fn simultaneous_effects_all_start_at_level_one() {
        let mut host = EffectHost::default();
        for id in ["n1", "n2", "n3", "n4"] {
            host.registry.register(base_effect(
                id,
                0,
                EffectAction::Narrative { text: id.into() },
            ));
        }
        let ctx = sim_ctx(TeamSide::Home, [0, 0]);
        let outcome = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        assert_eq!(outcome.narrative, ["n1", "n2", "n3", "n4"]);
    }

    #[test]
    fn outputs_merge_additively_in_priority_order() {
        let mut host = EffectHost::default();
        host.registry.register(base_effect(
            "second",
            10,
            EffectAction::Callback {
                steps: vec![
                    ActionPrimitive::ModifyScore {
                        target: EntityRef::OffensiveTeam,
                        delta: 2,
                    },
                    ActionPrimitive::AddNarrative { text: "second".into() },
                ],
            },
        ));
        host.registry.register(base_effect(
            "first",
            5,
            EffectAction::Callback {
                steps: vec![
                    ActionPrimitive::ModifyScore {
                        target: EntityRef::OffensiveTeam,
                        delta: 3,
                    },
                    ActionPrimitive::ModifyStamina {
                        target: EntityRef::DefensiveTeam,
                        delta: -0.05,
                    },
                    ActionPrimitive::AddNarrative { text: "first".into() },
                ],
            },
        ));
        let ctx = sim_ctx(TeamSide::Away, [0, 0]);
        let outcome = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        // Away is on offense, so both score deltas land on the away side.
        assert_eq!(outcome.score_delta, [0, 5]);
        assert_eq!(outcome.narrative, ["first", "second"]);
        assert_eq!(outcome.stamina_delta.len(), 3);
        assert!(outcome
            .stamina_delta
            .iter()
            .all(|(id, delta)| id.starts_with('h') && *delta == -0.05));
    }

    #[test]
    fn failing_effect_is_isolated() {
        let mut host = EffectHost::default();
        // Text entries cannot be incremented; this effect always errors.
        host.metadata
            .load([(MetaKey::team("home", "label"), MetaValue::Text("x".into()))]);
        host.registry.register(base_effect(
            "broken",
            0,
            EffectAction::Metadata {
                target: EntityRef::HomeTeam,
                field: "label".into(),
                op: MetaOp::Increment(MetaValue::Int(1)),
            },
        ));
        host.registry.register(base_effect(
            "fine",
            1,
            EffectAction::Narrative { text: "still here".into() },
        ));
        let ctx = sim_ctx(TeamSide::Home, [0, 0]);
        let outcome = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        assert_eq!(outcome.narrative, ["still here"]);
    }

    #[test]
    fn single_use_fires_once_per_round() {
        let mut host = EffectHost::default();
        let mut fx = base_effect(
            "once",
            0,
            EffectAction::Narrative { text: "bang".into() },
        );
        fx.duration = EffectDuration::SingleUse;
        host.registry.register(fx);
        let ctx = sim_ctx(TeamSide::Home, [0, 0]);
        let first = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        let second = host.dispatch(HookPoint::PossessionStart, &HookContext::Sim(&ctx));
        assert_eq!(first.narrative, ["bang"]);
        assert!(second.narrative.is_empty());
        // Tick reports it expired for the round's event log.
        assert_eq!(host.registry.tick(1), vec!["once".to_string()]);
    }

    #[test]
    fn leading_team_is_unresolvable_when_tied() {
        let ctx = sim_ctx(TeamSide::Home, [10, 10]);
        let resolved = resolve_entity(&HookContext::Sim(&ctx), &EntityRef::LeadingTeam);
        assert!(resolved.is_none());
    }
}
