//! # hb_core - Deterministic Basketball Simulation Engine
//!
//! Possession-by-possession 3v3 simulation whose rules are mutable at
//! runtime by an external governance process.
//!
//! ## Guarantees
//! - 100% deterministic: same teams, same rule snapshot, same seed,
//!   same host state, byte-identical result
//! - Pure simulation core: no I/O, no global state, no wall clock
//! - Bounded, typed effect surface: externally registered effects can
//!   move probabilities, scores, stamina and metadata, never run code
//! - Unconditional termination through the possession safety cap
//!
//! ## Layout
//! - [`models`]: competitors, rosters, possession records, results
//! - [`config`]: versioned rule snapshots and enactment
//! - [`engine`]: probability model, defensive optimizer, possession
//!   state machine, game orchestrator
//! - [`effects`]: metadata store, hook dispatch, effect registry
//! - [`round`]: round runner with per-game error isolation

pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod models;
pub mod round;

pub use config::{RuleError, RuleRejection, RuleSet, RuleValue, SimParams};
pub use effects::{
    EffectAction, EffectDuration, EffectEvent, EffectHost, EffectId, EffectRegistry, EntityRef,
    HookOutcome, HookPoint, MetadataStore, MetaKey, MetaValue, RegisteredEffect,
};
pub use engine::{simulate_game, simulate_game_with_effects};
pub use error::{Result, SimError};
pub use models::{
    Attributes, BoxScore, Competitor, GameResult, PossessionRecord, Roster, Team, TeamSide,
};
pub use round::{run_round, Matchup, RoundInput, RoundOutcome, RoundReport};
