//! # Allocation Percentages
//!
//! A contributor splits their notional share of a round budget among other
//! members as percentages. Percentages are kept as `f64` for bookkeeping
//! and scaled to integer micro-percent (10^-6 %) before being applied to a
//! [`crate::TokenAmount`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Micro-percent units in one percent.
pub const MICROS_PER_PERCENT: u64 = 1_000_000;

/// Slack allowed when checking that a contributor's percentages sum to at
/// most 100, absorbing binary rounding of decimal inputs.
pub const SUM_TOLERANCE: f64 = 1e-9;

/// A finite percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Percentage(f64);

impl Percentage {
    /// One hundred percent.
    pub const FULL: Self = Self(100.0);

    /// Validate a raw percentage.
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ValidationError::InvalidPercentage(value));
        }
        Ok(Self(value))
    }

    /// The raw value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether this percentage is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Integer micro-percent, rounded to nearest.
    pub fn as_micros(&self) -> u64 {
        (self.0 * MICROS_PER_PERCENT as f64).round() as u64
    }

    /// Sum a contributor's percentages.
    pub fn total<'a>(values: impl IntoIterator<Item = &'a Percentage>) -> f64 {
        values.into_iter().map(|p| p.0).sum()
    }

    /// Whether a contributor's percentages stay within 100 %.
    ///
    /// The raw sum may exceed 100 by [`SUM_TOLERANCE`]; the micro-percent
    /// sum actually applied to amounts may not exceed 100 % at all.
    pub fn within_limit<'a>(values: impl IntoIterator<Item = &'a Percentage>) -> bool {
        let (total, micros) = values
            .into_iter()
            .fold((0.0, 0u64), |(t, m), p| (t + p.0, m.saturating_add(p.as_micros())));
        total <= 100.0 + SUM_TOLERANCE && micros <= Self::FULL.as_micros()
    }
}

impl TryFrom<f64> for Percentage {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for f64 {
    fn from(p: Percentage) -> Self {
        p.0
    }
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        assert!(Percentage::new(0.0).is_ok());
        assert!(Percentage::new(100.0).is_ok());
        assert!(Percentage::new(-0.01).is_err());
        assert!(Percentage::new(100.01).is_err());
        assert!(Percentage::new(f64::NAN).is_err());
        assert!(Percentage::new(f64::INFINITY).is_err());
    }

    #[test]
    fn micros_round_to_nearest() {
        assert_eq!(Percentage::new(50.0).unwrap().as_micros(), 50_000_000);
        assert_eq!(Percentage::new(12.3456789).unwrap().as_micros(), 12_345_679);
        assert_eq!(Percentage::FULL.as_micros(), 100_000_000);
    }

    #[test]
    fn decimal_thirds_fit_within_limit() {
        let parts = [
            Percentage::new(33.33).unwrap(),
            Percentage::new(33.33).unwrap(),
            Percentage::new(33.34).unwrap(),
        ];
        assert!(Percentage::within_limit(&parts));
    }

    #[test]
    fn over_hundred_is_rejected_by_limit() {
        let parts = [Percentage::new(60.0).unwrap(), Percentage::new(40.01).unwrap()];
        assert!(!Percentage::within_limit(&parts));
    }

    #[test]
    fn rounded_micros_over_hundred_are_rejected() {
        let parts = [
            Percentage::new(33.3333336).unwrap(),
            Percentage::new(33.3333336).unwrap(),
            Percentage::new(33.3333328).unwrap(),
        ];
        assert!((Percentage::total(&parts) - 100.0).abs() <= SUM_TOLERANCE);
        assert_eq!(parts.iter().map(Percentage::as_micros).sum::<u64>(), 100_000_001);
        assert!(!Percentage::within_limit(&parts));
    }

    #[test]
    fn deserialize_validates() {
        assert!(serde_json::from_str::<Percentage>("42.5").is_ok());
        assert!(serde_json::from_str::<Percentage>("150").is_err());
    }
}
