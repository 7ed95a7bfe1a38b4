//! Scale factor guard.
//!
//! A scale factor maps an observer-relative frame to a consistent apparent
//! size. It must always be finite and inside
//! `[min_scale_factor, max_scale_factor]`; anything else is corrected here.
//!
//! # Safe scale law
//!
//! `factor = sqrt(reference_distance / distance)`, so the factor halves
//! every time the distance quadruples, and equals 1.0 at the reference
//! distance.

use crate::config::SafetyConfiguration;

/// Values at or below this are treated as degenerate scale factors.
pub const SCALE_EPSILON: f64 = 1e-8;

/// What [`clamp_scale_factor`] had to do to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampOutcome {
    /// Already valid (or checks are disabled).
    Unchanged,
    /// Finite but outside the range; pulled to the nearest bound.
    Clamped,
    /// Non-finite or degenerate; replaced with the minimum factor.
    Replaced,
}

/// Result of a scale clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleClamp {
    pub value: f64,
    pub outcome: ClampOutcome,
}

/// Clamp a scale factor into the configured range.
///
/// With safety checks disabled the input passes through untouched.
pub fn clamp_scale_factor(factor: f64, config: &SafetyConfiguration) -> ScaleClamp {
    if !config.safety_checks_enabled {
        return ScaleClamp {
            value: factor,
            outcome: ClampOutcome::Unchanged,
        };
    }
    if !factor.is_finite() || factor < SCALE_EPSILON {
        return ScaleClamp {
            value: config.min_scale_factor,
            outcome: ClampOutcome::Replaced,
        };
    }
    let value = factor.clamp(config.min_scale_factor, config.max_scale_factor);
    let outcome = if value == factor {
        ClampOutcome::Unchanged
    } else {
        ClampOutcome::Clamped
    };
    ScaleClamp { value, outcome }
}

/// Finite and in range. No side effects.
pub fn is_valid_scale_factor(factor: f64, config: &SafetyConfiguration) -> bool {
    factor.is_finite() && factor >= config.min_scale_factor && factor <= config.max_scale_factor
}

/// Scale factor a local frame should use at `distance` metres from the observer.
///
/// Non-positive or non-finite distances yield 1.0.
pub fn safe_scale_factor(distance: f64, config: &SafetyConfiguration) -> f64 {
    if !distance.is_finite() || distance <= 0.0 {
        return 1.0;
    }
    let raw = (config.reference_distance / distance).sqrt();
    clamp_scale_factor(raw, config).value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SafetyConfiguration {
        SafetyConfiguration::default()
    }

    #[test]
    fn nan_is_replaced_with_minimum() {
        let c = config();
        let clamp = clamp_scale_factor(f64::NAN, &c);
        assert_eq!(clamp.value, c.min_scale_factor);
        assert_eq!(clamp.outcome, ClampOutcome::Replaced);
    }

    #[test]
    fn tiny_and_negative_factors_are_replaced() {
        let c = config();
        assert_eq!(clamp_scale_factor(0.0, &c).outcome, ClampOutcome::Replaced);
        assert_eq!(clamp_scale_factor(-5.0, &c).outcome, ClampOutcome::Replaced);
        assert_eq!(
            clamp_scale_factor(f64::NEG_INFINITY, &c).value,
            c.min_scale_factor
        );
    }

    #[test]
    fn out_of_range_is_clamped() {
        let c = config();
        let high = clamp_scale_factor(1e9, &c);
        assert_eq!(high.value, c.max_scale_factor);
        assert_eq!(high.outcome, ClampOutcome::Clamped);

        let low = clamp_scale_factor(1e-6, &c);
        assert_eq!(low.value, c.min_scale_factor);
        assert_eq!(low.outcome, ClampOutcome::Clamped);

        assert_eq!(clamp_scale_factor(2.5, &c).outcome, ClampOutcome::Unchanged);
    }

    #[test]
    fn disabled_checks_pass_through() {
        let c = SafetyConfiguration {
            safety_checks_enabled: false,
            ..config()
        };
        assert!(clamp_scale_factor(f64::NAN, &c).value.is_nan());
        assert_eq!(clamp_scale_factor(1e9, &c).value, 1e9);
    }

    #[test]
    fn validity_predicate() {
        let c = config();
        assert!(is_valid_scale_factor(1.0, &c));
        assert!(is_valid_scale_factor(c.max_scale_factor, &c));
        assert!(!is_valid_scale_factor(f64::INFINITY, &c));
        assert!(!is_valid_scale_factor(0.0, &c));
    }

    #[test]
    fn safe_scale_is_one_at_reference_distance() {
        let c = config();
        assert!((safe_scale_factor(c.reference_distance, &c) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn safe_scale_halves_when_distance_quadruples() {
        let c = config();
        let near = safe_scale_factor(1_000.0, &c);
        let far = safe_scale_factor(4_000.0, &c);
        assert!((near / far - 2.0).abs() < 1e-9);
    }

    #[test]
    fn safe_scale_degenerate_distances() {
        let c = config();
        assert_eq!(safe_scale_factor(0.0, &c), 1.0);
        assert_eq!(safe_scale_factor(-10.0, &c), 1.0);
        assert_eq!(safe_scale_factor(f64::NAN, &c), 1.0);
        assert_eq!(safe_scale_factor(f64::INFINITY, &c), 1.0);
    }
}
