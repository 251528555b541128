//! Stamina economics.
//!
//! Per-possession drains and break-time recoveries. The governed knobs
//! (base drain, transition drain, recoveries) come from the rule
//! snapshot; per-action costs are engine constants.

use crate::config::SimParams;

#[derive(Debug, Clone, PartialEq)]
pub struct StaminaModel {
    /// Every on-court competitor pays this per possession.
    pub base_drain: f32,
    /// Extra for all six when the possession runs in transition.
    pub fastbreak_drain: f32,
    /// Cost of taking a shot.
    pub shot_cost: f32,
    /// Cost of attacking the rim.
    pub drive_cost: f32,
    /// Cost of moving the ball.
    pub pass_cost: f32,
    /// Cost of a free-throw trip.
    pub free_throw_cost: f32,
    /// Cost of closing out on the shooter.
    pub contest_cost: f32,
    /// Extra for each defender in a full-court press.
    pub press_cost: f32,
    /// Recovery at an ordinary quarter break.
    pub quarter_recovery: f32,
    /// Recovery at halftime.
    pub halftime_recovery: f32,
    /// Bench recovers this many times faster than the floor.
    pub bench_recovery_factor: f32,
}

impl StaminaModel {
    pub fn from_params(params: &SimParams) -> Self {
        Self {
            base_drain: params.base_stamina_drain,
            fastbreak_drain: params.fastbreak_stamina_drain,
            shot_cost: 0.008,
            drive_cost: 0.010,
            pass_cost: 0.002,
            free_throw_cost: 0.002,
            contest_cost: 0.004,
            press_cost: 0.012,
            quarter_recovery: params.quarter_break_recovery,
            halftime_recovery: params.halftime_recovery,
            bench_recovery_factor: 2.0,
        }
    }
}
