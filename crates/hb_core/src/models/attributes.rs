//! Nine-dimension competitor attribute vector.
//!
//! Attributes are integers in 1..=100 and their total must match the
//! league's creation budget when a competitor is built. The budget is a
//! creation-time rule only; simulation re-checks the per-field range
//! (a binding precondition) but never the sum.

use serde::{Deserialize, Serialize};

use super::ValidationError;

pub const ATTRIBUTE_MIN: u8 = 1;
pub const ATTRIBUTE_MAX: u8 = 100;
pub const ATTRIBUTE_COUNT: usize = 9;

/// The full attribute vector. Immutable during a game; the caller may
/// replace it between games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Outside shot quality (threes and long mid-range).
    pub shooting: u8,
    /// Finishing at the rim off drives and putbacks.
    pub finishing: u8,
    /// Passing and handle; drives turnover and assist chances.
    pub playmaking: u8,
    /// On-ball defense away from the rim.
    pub perimeter_defense: u8,
    /// Rim protection and post defense.
    pub interior_defense: u8,
    /// Board-crashing on both ends.
    pub rebounding: u8,
    /// Straight-line and lateral quickness.
    pub speed: u8,
    /// Physicality in traffic.
    pub strength: u8,
    /// Decision quality; poor awareness only ever costs, never helps.
    pub awareness: u8,
}

impl Attributes {
    /// Build from a fixed-order array and validate against the creation
    /// budget. Order matches the field declaration order.
    pub fn build(values: [u8; ATTRIBUTE_COUNT], budget: u32) -> Result<Self, ValidationError> {
        let attrs = Self {
            shooting: values[0],
            finishing: values[1],
            playmaking: values[2],
            perimeter_defense: values[3],
            interior_defense: values[4],
            rebounding: values[5],
            speed: values[6],
            strength: values[7],
            awareness: values[8],
        };
        attrs.validate_ranges()?;
        attrs.validate_budget(budget)?;
        Ok(attrs)
    }

    pub fn as_array(&self) -> [u8; ATTRIBUTE_COUNT] {
        [
            self.shooting,
            self.finishing,
            self.playmaking,
            self.perimeter_defense,
            self.interior_defense,
            self.rebounding,
            self.speed,
            self.strength,
            self.awareness,
        ]
    }

    pub fn total(&self) -> u32 {
        self.as_array().iter().map(|&v| u32::from(v)).sum()
    }

    /// Per-field range check. Used both at creation and as the game
    /// binding precondition.
    pub fn validate_ranges(&self) -> Result<(), ValidationError> {
        const NAMES: [&str; ATTRIBUTE_COUNT] = [
            "shooting",
            "finishing",
            "playmaking",
            "perimeter_defense",
            "interior_defense",
            "rebounding",
            "speed",
            "strength",
            "awareness",
        ];
        for (name, value) in NAMES.iter().zip(self.as_array()) {
            if !(ATTRIBUTE_MIN..=ATTRIBUTE_MAX).contains(&value) {
                return Err(ValidationError::AttributeOutOfRange {
                    name,
                    value,
                    min: ATTRIBUTE_MIN,
                    max: ATTRIBUTE_MAX,
                });
            }
        }
        Ok(())
    }

    pub fn validate_budget(&self, budget: u32) -> Result<(), ValidationError> {
        let total = self.total();
        if total != budget {
            return Err(ValidationError::BudgetMismatch { total, budget });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_accepts_exact_budget() {
        let attrs = Attributes::build([50; 9], 450).unwrap();
        assert_eq!(attrs.total(), 450);
        assert_eq!(attrs.shooting, 50);
        assert_eq!(attrs.awareness, 50);
    }

    #[test]
    fn build_rejects_budget_mismatch() {
        let err = Attributes::build([50; 9], 449).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BudgetMismatch {
                total: 450,
                budget: 449
            }
        );
    }

    #[test]
    fn build_rejects_out_of_range_field() {
        let mut values = [50; 9];
        values[3] = 0;
        let err = Attributes::build(values, 400).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::AttributeOutOfRange {
                name: "perimeter_defense",
                value: 0,
                ..
            }
        ));
    }

    #[test]
    fn array_round_trip_preserves_order() {
        let values = [10, 20, 30, 40, 50, 60, 70, 80, 90];
        let attrs = Attributes::build(values, 450).unwrap();
        assert_eq!(attrs.as_array(), values);
    }
}
