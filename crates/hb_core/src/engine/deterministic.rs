//! Hash-based deterministic selection.
//!
//! Some choices need seeded variance without consuming the engine's main
//! RNG stream, so that adding or removing one such choice never shifts
//! every later roll. These helpers hash (seed, possession, actor,
//! subcase) instead. `FxHasher` is used because the std `DefaultHasher`
//! is not stable across Rust versions, which would desync replays.

use fxhash::FxHasher;
use std::hash::{Hash, Hasher};

/// Subcase constants, one per decision site. `{SITE}_{FIELD}` naming,
/// grouped by 0x01xx ranges per site.
pub mod subcase {
    /// Defensive scheme score noise. The scheme index is added on top.
    pub const SCHEME_NOISE: u32 = 0x0100;

    /// Coin for a game still tied after the sudden-death allowance.
    pub const DEADLOCK_COIN: u32 = 0x0200;
}

fn mix(seed: u64, tick: u64, actor_idx: usize, subcase: u32) -> u64 {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    tick.hash(&mut hasher);
    actor_idx.hash(&mut hasher);
    subcase.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic f32 in `[min, max)` for the given decision site.
#[inline]
pub fn deterministic_f32(
    seed: u64,
    tick: u64,
    actor_idx: usize,
    subcase: u32,
    min: f32,
    max: f32,
) -> f32 {
    let hash = mix(seed, tick, actor_idx, subcase);
    let t = (hash as f64) / (u64::MAX as f64);
    min + (max - min) * (t as f32)
}

/// Deterministic bool that is true with the given probability.
#[inline]
pub fn deterministic_bool(
    seed: u64,
    tick: u64,
    actor_idx: usize,
    subcase: u32,
    probability: f32,
) -> bool {
    deterministic_f32(seed, tick, actor_idx, subcase, 0.0, 1.0) < probability
}
