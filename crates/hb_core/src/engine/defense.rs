//! Defensive scheme selection and man-marking assignment.
//!
//! Both optimizers are pure functions of their inputs plus the game
//! seed and possession index. Scheme scores carry seeded noise whose
//! amplitude shrinks as the defense's average awareness rises: smarter
//! teams call schemes more consistently. The marking assignment is an
//! exhaustive search over the six permutations of the 3x3 space.

use serde::{Deserialize, Serialize};

use crate::models::{Attributes, TeamSide};

use super::deterministic::{deterministic_f32, subcase};
use super::state::PlayerView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefensiveScheme {
    ManToMan,
    SwitchingMan,
    Zone,
    FullCourtPress,
}

impl DefensiveScheme {
    pub const ALL: [DefensiveScheme; 4] = [
        DefensiveScheme::ManToMan,
        DefensiveScheme::SwitchingMan,
        DefensiveScheme::Zone,
        DefensiveScheme::FullCourtPress,
    ];

    /// Man-marking schemes get an explicit defender-to-attacker map.
    pub fn is_man_marking(self) -> bool {
        matches!(
            self,
            DefensiveScheme::ManToMan
                | DefensiveScheme::SwitchingMan
                | DefensiveScheme::FullCourtPress
        )
    }

    pub fn is_press(self) -> bool {
        matches!(self, DefensiveScheme::FullCourtPress)
    }
}

/// The call made before each possession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefensiveCall {
    pub scheme: DefensiveScheme,
    /// `assignment[defender_slot]` is the attacker slot that defender
    /// marks. Present for man-marking schemes only.
    pub assignment: Option<[usize; 3]>,
}

/// Inputs to the scheme scoring function, all pre-normalized to [0, 1]
/// except the margin.
#[derive(Debug, Clone, Copy)]
pub struct SchemeInputs {
    pub shooting_threat: f32,
    pub playmaking_threat: f32,
    pub speed_threat: f32,
    pub best_defender: f32,
    pub avg_awareness: f32,
    pub avg_stamina: f32,
    /// Defense score minus offense score; negative when trailing.
    pub margin: i64,
    pub endgame_active: bool,
}

impl SchemeInputs {
    pub fn gather(attackers: &[PlayerView], defenders: &[PlayerView], margin: i64, endgame_active: bool) -> Self {
        let norm = |v: u8| f32::from(v) / 100.0;
        let max_of = |f: &dyn Fn(&Attributes) -> u8, views: &[PlayerView]| {
            views
                .iter()
                .map(|p| norm(f(&p.attrs)))
                .fold(0.0f32, f32::max)
        };
        let avg_of = |f: &dyn Fn(&Attributes) -> u8, views: &[PlayerView]| {
            views.iter().map(|p| norm(f(&p.attrs))).sum::<f32>() / views.len().max(1) as f32
        };
        let best_defender = defenders
            .iter()
            .map(|p| {
                norm(p.attrs.perimeter_defense) * 0.5 + norm(p.attrs.interior_defense) * 0.5
            })
            .fold(0.0f32, f32::max);
        Self {
            shooting_threat: max_of(&|a| a.shooting, attackers),
            playmaking_threat: avg_of(&|a| a.playmaking, attackers),
            speed_threat: max_of(&|a| a.speed, attackers),
            best_defender,
            avg_awareness: avg_of(&|a| a.awareness, defenders),
            avg_stamina: defenders.iter().map(|p| p.stamina).sum::<f32>()
                / defenders.len().max(1) as f32,
            margin,
            endgame_active,
        }
    }
}

/// Deterministic raw score for one scheme, before noise.
fn scheme_score(scheme: DefensiveScheme, inputs: &SchemeInputs) -> f32 {
    // Urgency rises with the deficit and spikes when the target chase is on.
    let deficit = (-inputs.margin).max(0) as f32;
    let urgency = (deficit / 12.0).min(1.0) + if inputs.endgame_active { 0.35 } else { 0.0 };
    match scheme {
        DefensiveScheme::ManToMan => {
            52.0 + inputs.best_defender * 22.0 + inputs.avg_awareness * 8.0
                - inputs.speed_threat * 10.0
        }
        DefensiveScheme::SwitchingMan => {
            46.0 + inputs.avg_awareness * 18.0 + inputs.speed_threat * 12.0
                - (1.0 - inputs.avg_stamina) * 8.0
        }
        DefensiveScheme::Zone => {
            40.0 + (1.0 - inputs.avg_stamina) * 25.0 + inputs.playmaking_threat * 12.0
                - inputs.shooting_threat * 15.0
        }
        DefensiveScheme::FullCourtPress => {
            30.0 + urgency * 40.0 + inputs.avg_stamina * 18.0
                - inputs.playmaking_threat * 15.0
        }
    }
}

/// Pick the scheme for this possession.
pub fn select_scheme(
    inputs: &SchemeInputs,
    seed: u64,
    possession: u32,
    side: TeamSide,
) -> DefensiveScheme {
    // Awareness tightens the spread of scheme calls.
    let amplitude = 6.0 * (1.0 - 0.6 * inputs.avg_awareness);
    let mut best = DefensiveScheme::ManToMan;
    let mut best_score = f32::NEG_INFINITY;
    for (idx, scheme) in DefensiveScheme::ALL.into_iter().enumerate() {
        let noise = deterministic_f32(
            seed,
            u64::from(possession),
            side.index(),
            subcase::SCHEME_NOISE + idx as u32,
            -amplitude,
            amplitude,
        );
        let score = scheme_score(scheme, inputs) + noise;
        if score > best_score {
            best = scheme;
            best_score = score;
        }
    }
    best
}

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

fn threat(attacker: &Attributes) -> f32 {
    (f32::from(attacker.shooting) * 0.35
        + f32::from(attacker.finishing) * 0.25
        + f32::from(attacker.playmaking) * 0.25
        + f32::from(attacker.speed) * 0.15)
        / 100.0
}

fn containment(defender: &Attributes, attacker: &Attributes) -> f32 {
    // Weight the defender's tools by what the attacker actually does.
    let weights = f32::from(attacker.shooting)
        + f32::from(attacker.finishing)
        + f32::from(attacker.speed);
    (f32::from(defender.perimeter_defense) * f32::from(attacker.shooting)
        + f32::from(defender.interior_defense) * f32::from(attacker.finishing)
        + f32::from(defender.speed) * f32::from(attacker.speed))
        / (100.0 * weights.max(1.0))
}

fn chase_drain(defender: &PlayerView, attacker: &PlayerView) -> f32 {
    (f32::from(attacker.attrs.speed) / 100.0) * (1.0 - defender.stamina)
}

/// Assign each defender an attacker by minimizing the summed pair cost
/// over all six permutations. Ties keep the earliest permutation, so the
/// result is deterministic with no random source at all.
pub fn assign_marks(
    defenders: &[PlayerView],
    attackers: &[PlayerView],
    context_weight: f32,
) -> [usize; 3] {
    debug_assert_eq!(defenders.len(), 3);
    debug_assert_eq!(attackers.len(), 3);
    let mut best = PERMUTATIONS[0];
    let mut best_cost = f32::INFINITY;
    for perm in PERMUTATIONS {
        let mut total = 0.0;
        for (defender_slot, &attacker_slot) in perm.iter().enumerate() {
            let d = &defenders[defender_slot];
            let a = &attackers[attacker_slot];
            total += threat(&a.attrs) - containment(&d.attrs, &a.attrs)
                + chase_drain(d, a) * context_weight;
        }
        if total < best_cost {
            best_cost = total;
            best = perm;
        }
    }
    best
}
