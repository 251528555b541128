//! Effect lifecycle management.
//!
//! The registry is never stored directly. It is rebuilt before each
//! round by folding the durable event log: one pass applies every
//! `Registered` event, a second removes every id named by an `Expired`
//! or `Repealed` event. Because the subtraction is a set difference, the
//! fold is idempotent and insensitive to where subtractive events sit
//! relative to unrelated registrations.
//!
//! Firing order is fixed: registration round, then the explicit priority
//! field, then log position, then id. Never the iteration order of an
//! unordered structure.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::effect::{EffectId, RegisteredEffect};

/// Durable log entry shapes. This core folds them and decides which ids
/// expire; appending to the log is the storage layer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectEvent {
    Registered { effect: RegisteredEffect },
    Expired { id: EffectId },
    Repealed { id: EffectId },
}

#[derive(Debug, Default, Clone)]
pub struct EffectRegistry {
    effects: Vec<RegisteredEffect>,
    next_seq: u64,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-pass fold over the event log.
    pub fn rebuild(events: &[EffectEvent]) -> Self {
        let mut by_id: BTreeMap<EffectId, RegisteredEffect> = BTreeMap::new();
        let mut seq: u64 = 0;
        for event in events {
            if let EffectEvent::Registered { effect } = event {
                // First registration of an id wins; replaying a log
                // prefix twice changes nothing.
                by_id.entry(effect.id.clone()).or_insert_with(|| {
                    let mut rebuilt = effect.clone();
                    rebuilt.seq = seq;
                    rebuilt.fired = false;
                    rebuilt
                });
            }
            seq += 1;
        }
        let removed: BTreeSet<&EffectId> = events
            .iter()
            .filter_map(|event| match event {
                EffectEvent::Expired { id } | EffectEvent::Repealed { id } => Some(id),
                EffectEvent::Registered { .. } => None,
            })
            .collect();
        let mut effects: Vec<RegisteredEffect> = by_id
            .into_values()
            .filter(|effect| !removed.contains(&effect.id))
            .collect();
        effects.sort_by(Self::firing_order);
        Self {
            effects,
            next_seq: seq,
        }
    }

    /// Direct registration, used when governance enacts mid-round and by
    /// tests. Log replay is the canonical path.
    pub fn register(&mut self, mut effect: RegisteredEffect) {
        if self.contains(&effect.id) {
            return;
        }
        effect.seq = self.next_seq;
        self.next_seq += 1;
        self.effects.push(effect);
        self.effects.sort_by(Self::firing_order);
    }

    /// Remove an effect by id. Terminal: a repealed effect only comes
    /// back through a fresh `Registered` event with a new id.
    pub fn repeal(&mut self, id: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|effect| effect.id != id);
        self.effects.len() != before
    }

    /// Advance lifetimes for the round that just completed. Expired
    /// effects are removed and their ids returned so the caller can
    /// append the matching events to the durable log.
    pub fn tick(&mut self, current_round: u32) -> Vec<EffectId> {
        let mut expired = Vec::new();
        self.effects.retain(|effect| {
            if effect.expired_at(current_round) {
                expired.push(effect.id.clone());
                false
            } else {
                true
            }
        });
        if !expired.is_empty() {
            log::debug!(
                "round {}: {} effect(s) expired: {:?}",
                current_round,
                expired.len(),
                expired
            );
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.effects.iter().any(|effect| effect.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredEffect> {
        self.effects.iter().find(|effect| effect.id == id)
    }

    pub fn active_ids(&self) -> Vec<EffectId> {
        let mut ids: Vec<EffectId> =
            self.effects.iter().map(|effect| effect.id.clone()).collect();
        ids.sort();
        ids
    }

    pub(crate) fn slot(&self, index: usize) -> &RegisteredEffect {
        &self.effects[index]
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut RegisteredEffect {
        &mut self.effects[index]
    }

    fn firing_order(a: &RegisteredEffect, b: &RegisteredEffect) -> std::cmp::Ordering {
        a.registered_round
            .cmp(&b.registered_round)
            .then(a.priority.cmp(&b.priority))
            .then(a.seq.cmp(&b.seq))
            .then(a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::effect::{EffectAction, EffectDuration};
    use crate::effects::hooks::HookPoint;

    fn effect(id: &str, round: u32, priority: i32) -> RegisteredEffect {
        RegisteredEffect {
            id: id.into(),
            proposal_id: format!("prop-{id}"),
            hooks: vec![HookPoint::PossessionStart],
            conditions: vec![],
            action: EffectAction::Narrative { text: id.into() },
            duration: EffectDuration::Permanent,
            priority,
            registered_round: round,
            seq: 0,
            fired: false,
        }
    }

    fn registered(id: &str, round: u32, priority: i32) -> EffectEvent {
        EffectEvent::Registered {
            effect: effect(id, round, priority),
        }
    }

    #[test]
    fn rebuild_subtracts_expired_and_repealed() {
        let events = vec![
            registered("a", 1, 0),
            registered("b", 1, 0),
            registered("c", 2, 0),
            EffectEvent::Expired { id: "a".into() },
            EffectEvent::Repealed { id: "c".into() },
        ];
        let registry = EffectRegistry::rebuild(&events);
        assert_eq!(registry.active_ids(), vec!["b".to_string()]);
    }

    #[test]
    fn rebuild_is_order_insensitive_for_subtractions() {
        let forward = vec![
            registered("a", 1, 0),
            EffectEvent::Expired { id: "a".into() },
            registered("b", 1, 0),
            EffectEvent::Repealed { id: "z".into() },
        ];
        // Subtractive events moved ahead of the registrations they name.
        let shuffled = vec![
            EffectEvent::Expired { id: "a".into() },
            EffectEvent::Repealed { id: "z".into() },
            registered("a", 1, 0),
            registered("b", 1, 0),
        ];
        assert_eq!(
            EffectRegistry::rebuild(&forward).active_ids(),
            EffectRegistry::rebuild(&shuffled).active_ids()
        );
    }

    #[test]
    fn rebuild_twice_is_idempotent() {
        let events = vec![
            registered("a", 1, 0),
            registered("b", 2, 5),
            EffectEvent::Expired { id: "a".into() },
        ];
        let doubled: Vec<EffectEvent> =
            events.iter().chain(events.iter()).cloned().collect();
        assert_eq!(
            EffectRegistry::rebuild(&events).active_ids(),
            EffectRegistry::rebuild(&doubled).active_ids()
        );
    }

    #[test]
    fn firing_order_uses_round_then_priority() {
        let events = vec![
            registered("late", 3, 0),
            registered("second", 1, 10),
            registered("first", 1, 5),
        ];
        let registry = EffectRegistry::rebuild(&events);
        let order: Vec<&str> = (0..registry.len())
            .map(|i| registry.slot(i).id.as_str())
            .collect();
        assert_eq!(order, ["first", "second", "late"]);
    }

    #[test]
    fn tick_removes_and_reports_expired_ids() {
        let mut registry = EffectRegistry::new();
        let mut countdown = effect("short", 4, 0);
        countdown.duration = EffectDuration::Rounds(2);
        registry.register(countdown);
        registry.register(effect("forever", 4, 0));

        assert!(registry.tick(4).is_empty());
        assert_eq!(registry.len(), 2);

        let expired = registry.tick(5);
        assert_eq!(expired, vec!["short".to_string()]);
        assert_eq!(registry.active_ids(), vec!["forever".to_string()]);
    }

    #[test]
    fn repeal_is_terminal_and_reports_removal() {
        let mut registry = EffectRegistry::new();
        registry.register(effect("a", 1, 0));
        assert!(registry.repeal("a"));
        assert!(!registry.repeal("a"));
        assert!(registry.is_empty());
    }
}
