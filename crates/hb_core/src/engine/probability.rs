//! Probability model for possession resolution.
//!
//! All functions are pure: attributes, contest, fatigue and rule scales
//! in, a probability out. Every curve is logistic, never linear, so no
//! attribute value can push a result past its bounds. A final
//! probability is the product of independently bounded modifiers:
//!
//! - a base curve keyed to the acting attribute and the shot kind
//! - a contest modifier from the opposing defender, at most 1.0
//! - a decision modifier that only ever penalizes, never rewards
//! - a fatigue modifier monotonic in current stamina
//! - the rule scale, neutral at 1.0
//!
//! Effect-supplied deltas are added after the product and before the
//! final clamp.
//!
//! Out-of-range inputs (attribute outside 1..=100, stamina outside
//! [0, 1]) are contract violations on the caller, not recoverable
//! conditions, and are checked with `debug_assert!`.

use serde::{Deserialize, Serialize};

use crate::models::Attributes;

/// Floor and ceiling every resolved probability respects.
pub const MIN_PROB: f32 = 0.01;
pub const MAX_PROB: f32 = 0.97;

const CONTEST_FLOOR: f32 = 0.62;
const DECISION_PENALTY_SPAN: f32 = 0.25;
const FATIGUE_FLOOR: f32 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotKind {
    Three,
    MidRange,
    /// Layup or dunk at the end of a drive.
    Drive,
    /// Uncontested-or-nearly transition finish.
    FastBreak,
    /// Desperation attempt forced by the shot clock.
    ForcedHeave,
}

impl ShotKind {
    /// Base curve parameters: (floor, span, attribute midpoint, slope).
    /// Output of the base curve lives in [floor, floor + span].
    fn curve(self) -> (f32, f32, f32, f32) {
        match self {
            ShotKind::Three => (0.18, 0.27, 58.0, 0.075),
            ShotKind::MidRange => (0.25, 0.30, 55.0, 0.08),
            ShotKind::Drive => (0.38, 0.33, 52.0, 0.08),
            ShotKind::FastBreak => (0.52, 0.30, 50.0, 0.09),
            ShotKind::ForcedHeave => (0.02, 0.08, 62.0, 0.07),
        }
    }

    /// The attribute the base curve reads.
    pub fn acting_attribute(self, attrs: &Attributes) -> u8 {
        match self {
            ShotKind::Three | ShotKind::MidRange | ShotKind::ForcedHeave => attrs.shooting,
            ShotKind::Drive | ShotKind::FastBreak => attrs.finishing,
        }
    }

    /// The defender attribute that contests this shot.
    pub fn contest_attribute(self, attrs: &Attributes) -> u8 {
        match self {
            ShotKind::Three | ShotKind::MidRange | ShotKind::ForcedHeave => {
                attrs.perimeter_defense
            }
            ShotKind::Drive | ShotKind::FastBreak => attrs.interior_defense,
        }
    }

    pub fn is_three(self) -> bool {
        matches!(self, ShotKind::Three | ShotKind::ForcedHeave)
    }
}

#[inline]
fn logistic(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
fn check_attribute(value: u8) {
    debug_assert!(
        (1..=100).contains(&value),
        "attribute {} outside 1..=100",
        value
    );
}

#[inline]
fn check_stamina(value: f32) {
    debug_assert!(
        (0.0..=1.0).contains(&value),
        "stamina {} outside [0, 1]",
        value
    );
}

/// Base make chance from the shooter's relevant attribute alone.
pub fn base_shot_curve(attribute: u8, kind: ShotKind) -> f32 {
    check_attribute(attribute);
    let (floor, span, mid, slope) = kind.curve();
    floor + span * logistic(slope * (f32::from(attribute) - mid))
}

/// Contest pressure from the defender. 1.0 means no effect; a perfect
/// defender pulls the product down to the contest floor, never below.
pub fn contest_modifier(defender_attribute: u8) -> f32 {
    check_attribute(defender_attribute);
    let span = 1.0 - CONTEST_FLOOR;
    1.0 - span * logistic(0.07 * (f32::from(defender_attribute) - 50.0))
}

/// Penalty for poor situational judgment under pressure. Never exceeds
/// 1.0: good awareness stops the bleeding, it does not add talent.
pub fn decision_modifier(awareness: u8, pressure: f32) -> f32 {
    check_attribute(awareness);
    debug_assert!((0.0..=1.0).contains(&pressure), "pressure outside [0, 1]");
    let lapse = 1.0 - logistic(0.09 * (f32::from(awareness) - 50.0));
    1.0 - DECISION_PENALTY_SPAN * pressure * lapse
}

/// Monotonic in stamina, bounded below so exhaustion degrades rather
/// than zeroes a competitor.
pub fn fatigue_modifier(stamina: f32) -> f32 {
    check_stamina(stamina);
    FATIGUE_FLOOR + (1.0 - FATIGUE_FLOOR) * logistic(6.0 * (stamina - 0.35))
}

/// Full shot probability.
///
/// `effect_delta` is the summed shot-probability delta supplied by
/// active effects for this possession; it lands after the product so the
/// clamp here is the single authority on bounds.
#[allow(clippy::too_many_arguments)]
pub fn shot_probability(
    shooter: &Attributes,
    defender: &Attributes,
    kind: ShotKind,
    stamina: f32,
    pressure: f32,
    rule_scale: f32,
    effect_delta: f32,
) -> f32 {
    let base = base_shot_curve(kind.acting_attribute(shooter), kind);
    let contest = contest_modifier(kind.contest_attribute(defender));
    let decision = decision_modifier(shooter.awareness, pressure);
    let fatigue = fatigue_modifier(stamina);
    let product = base * contest * decision * fatigue * rule_scale;
    (product + effect_delta).clamp(MIN_PROB, MAX_PROB)
}

/// Free throws: no contest, lighter fatigue pull, keyed to shooting.
pub fn free_throw_probability(shooter: &Attributes, stamina: f32) -> f32 {
    check_stamina(stamina);
    let base = 0.45 + 0.45 * logistic(0.08 * (f32::from(shooter.shooting) - 50.0));
    let fatigue = 0.85 + 0.15 * logistic(6.0 * (stamina - 0.35));
    (base * fatigue).clamp(MIN_PROB, MAX_PROB)
}

/// Chance the ball handler loses this touch to the matchup defender.
pub fn turnover_probability(
    handler: &Attributes,
    defender: &Attributes,
    stamina: f32,
    pressing: bool,
    rule_scale: f32,
) -> f32 {
    check_stamina(stamina);
    let security = logistic(
        0.06 * (f32::from(handler.playmaking) * 0.7 + f32::from(handler.awareness) * 0.3 - 50.0),
    );
    let ball_pressure = logistic(0.06 * (f32::from(defender.perimeter_defense) - 50.0));
    let fatigue_leak = 1.0 + (1.0 - fatigue_modifier(stamina));
    let press_bonus = if pressing { 1.35 } else { 1.0 };
    let raw = 0.16 * (1.0 - security * 0.75) * (0.6 + 0.8 * ball_pressure);
    (raw * fatigue_leak * press_bonus * rule_scale).clamp(0.01, 0.35)
}

/// Chance the contest draws a whistle on the defender.
pub fn foul_probability(defender: &Attributes, kind: ShotKind, rule_scale: f32) -> f32 {
    let base = match kind {
        ShotKind::Drive | ShotKind::FastBreak => 0.11,
        ShotKind::MidRange => 0.045,
        ShotKind::Three | ShotKind::ForcedHeave => 0.025,
    };
    let discipline = logistic(0.07 * (f32::from(defender.awareness) - 50.0));
    let physicality = logistic(0.05 * (f32::from(defender.strength) - 50.0));
    (base * (1.3 - 0.6 * discipline) * (0.8 + 0.5 * physicality) * rule_scale)
        .clamp(0.005, 0.30)
}

/// Rebound pull for one competitor. Side totals are compared to award
/// the board; the offense total is discounted by the caller.
pub fn rebound_weight(competitor: &Attributes, stamina: f32) -> f32 {
    check_stamina(stamina);
    let craft = f32::from(competitor.rebounding) * 0.6
        + f32::from(competitor.strength) * 0.25
        + f32::from(competitor.awareness) * 0.15;
    logistic(0.05 * (craft - 50.0)) * fatigue_modifier(stamina)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(level: u8) -> Attributes {
        Attributes {
            shooting: level,
            finishing: level,
            playmaking: level,
            perimeter_defense: level,
            interior_defense: level,
            rebounding: level,
            speed: level,
            strength: level,
            awareness: level,
        }
    }

    #[test]
    fn shot_probability_stays_bounded_at_extremes() {
        for kind in [
            ShotKind::Three,
            ShotKind::MidRange,
            ShotKind::Drive,
            ShotKind::FastBreak,
            ShotKind::ForcedHeave,
        ] {
            for shooter in [1u8, 50, 100] {
                for defender in [1u8, 50, 100] {
                    for stamina in [0.0f32, 0.5, 1.0] {
                        let p = shot_probability(
                            &attrs(shooter),
                            &attrs(defender),
                            kind,
                            stamina,
                            0.5,
                            1.0,
                            0.0,
                        );
                        assert!((MIN_PROB..=MAX_PROB).contains(&p), "{:?}: {}", kind, p);
                    }
                }
            }
        }
    }

    #[test]
    fn effect_delta_is_clamped_not_trusted() {
        let p = shot_probability(&attrs(50), &attrs(50), ShotKind::Drive, 1.0, 0.2, 1.0, 9.0);
        assert_eq!(p, MAX_PROB);
        let p = shot_probability(&attrs(50), &attrs(50), ShotKind::Drive, 1.0, 0.2, 1.0, -9.0);
        assert_eq!(p, MIN_PROB);
    }

    #[test]
    fn better_shooter_makes_more() {
        let low = shot_probability(&attrs(20), &attrs(50), ShotKind::Three, 1.0, 0.3, 1.0, 0.0);
        let high = shot_probability(&attrs(90), &attrs(50), ShotKind::Three, 1.0, 0.3, 1.0, 0.0);
        assert!(high > low);
    }

    #[test]
    fn contest_never_helps_the_shooter() {
        let open = shot_probability(&attrs(60), &attrs(1), ShotKind::MidRange, 1.0, 0.3, 1.0, 0.0);
        let contested =
            shot_probability(&attrs(60), &attrs(95), ShotKind::MidRange, 1.0, 0.3, 1.0, 0.0);
        assert!(contested < open);
        assert!(contest_modifier(1) <= 1.0);
        assert!(contest_modifier(100) >= CONTEST_FLOOR);
    }

    #[test]
    fn decision_modifier_only_penalizes() {
        for awareness in [1u8, 30, 60, 100] {
            for pressure in [0.0f32, 0.5, 1.0] {
                let m = decision_modifier(awareness, pressure);
                assert!(m <= 1.0);
                assert!(m > 1.0 - DECISION_PENALTY_SPAN - 1e-6);
            }
        }
        // Zero pressure means no penalty regardless of awareness.
        assert_eq!(decision_modifier(1, 0.0), 1.0);
    }

    #[test]
    fn fatigue_modifier_is_monotonic() {
        let mut last = 0.0;
        for step in 0..=20 {
            let stamina = step as f32 / 20.0;
            let m = fatigue_modifier(stamina);
            assert!(m >= last);
            assert!(m <= 1.0);
            last = m;
        }
    }

    #[test]
    fn pressing_raises_turnovers() {
        let calm = turnover_probability(&attrs(50), &attrs(50), 0.8, false, 1.0);
        let pressed = turnover_probability(&attrs(50), &attrs(50), 0.8, true, 1.0);
        assert!(pressed > calm);
    }

    #[test]
    fn drives_draw_more_fouls_than_threes() {
        let drive = foul_probability(&attrs(50), ShotKind::Drive, 1.0);
        let three = foul_probability(&attrs(50), ShotKind::Three, 1.0);
        assert!(drive > three);
    }
}
