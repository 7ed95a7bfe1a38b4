//! Force and velocity guard.
//!
//! Gravity is capped in g-force, not newtons: the same force produces very
//! different accelerations depending on the body's mass, and the permissible
//! velocity tightens as the local scale factor grows.

use crate::config::SafetyConfiguration;
use crate::vector::Vec3;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Masses at or below this skip force clamping entirely.
pub const MASS_EPSILON: f64 = 1e-8;

/// Lowest g-force cap a caller may request.
pub const MIN_G_CAP: f64 = 0.1;

/// Floor for the velocity ceiling regardless of scale.
pub const MIN_SAFE_VELOCITY: f64 = 100.0;

/// What the force guard did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForceOutcome {
    /// Within limits, disabled, or massless.
    Unchanged,
    /// Rescaled to the cap; carries the g-force before clamping.
    Limited { g_force: f64 },
    /// Contained non-finite components; replaced with zero.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceClamp {
    pub force: Vec3,
    pub outcome: ForceOutcome,
}

/// Acceleration in g implied by `force` on a body of `mass` kilograms.
///
/// Masses below 1 kg are treated as 1 kg so tiny bodies cannot produce
/// unbounded accelerations.
pub fn g_force(force: &Vec3, mass: f64) -> f64 {
    force.length() / mass.max(1.0) / STANDARD_GRAVITY
}

/// Clamp a gravitational force so it never exceeds the g-force cap.
///
/// `max_g_override` replaces the configured cap for this call; it is floored
/// at [`MIN_G_CAP`]. Direction is preserved when limiting.
pub fn clamp_gravitational_force(
    force: Vec3,
    target_mass: f64,
    max_g_override: Option<f64>,
    config: &SafetyConfiguration,
) -> ForceClamp {
    if !config.safety_checks_enabled || !(target_mass >= MASS_EPSILON) {
        return ForceClamp {
            force,
            outcome: ForceOutcome::Unchanged,
        };
    }
    if !force.is_finite() {
        return ForceClamp {
            force: Vec3::ZERO,
            outcome: ForceOutcome::Discarded,
        };
    }

    let max_g = max_g_override.unwrap_or(config.max_g_force).max(MIN_G_CAP);
    let g = g_force(&force, target_mass);
    if g <= max_g {
        return ForceClamp {
            force,
            outcome: ForceOutcome::Unchanged,
        };
    }

    let max_magnitude = max_g * STANDARD_GRAVITY * target_mass.max(1.0);
    ForceClamp {
        force: force.normalize() * max_magnitude,
        outcome: ForceOutcome::Limited { g_force: g },
    }
}

/// Same g-force test as the clamp, without modifying anything.
pub fn is_force_within_safe_limits(force: &Vec3, mass: f64, config: &SafetyConfiguration) -> bool {
    if !force.is_finite() {
        return false;
    }
    if !(mass >= MASS_EPSILON) {
        return true;
    }
    g_force(force, mass) <= config.max_g_force
}

/// Velocity ceiling (m/s) for a frame with the given scale factor.
pub fn max_safe_velocity(scale_factor: f64, config: &SafetyConfiguration) -> f64 {
    let base = config.max_safe_velocity_ms;
    let ceiling = base.max(MIN_SAFE_VELOCITY);
    (base / scale_factor.max(0.1)).clamp(MIN_SAFE_VELOCITY, ceiling)
}

/// What the velocity guard did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityOutcome {
    Unchanged,
    Limited { speed: f64 },
    Discarded,
}

/// Rescale a velocity (m/s) to the safe ceiling for `scale_factor`.
pub fn clamp_velocity(
    velocity: Vec3,
    scale_factor: f64,
    config: &SafetyConfiguration,
) -> (Vec3, VelocityOutcome) {
    if !config.safety_checks_enabled {
        return (velocity, VelocityOutcome::Unchanged);
    }
    if !velocity.is_finite() {
        return (Vec3::ZERO, VelocityOutcome::Discarded);
    }
    let limit = max_safe_velocity(scale_factor, config);
    let speed = velocity.length();
    if speed <= limit {
        return (velocity, VelocityOutcome::Unchanged);
    }
    (
        velocity.normalize() * limit,
        VelocityOutcome::Limited { speed },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SafetyConfiguration {
        SafetyConfiguration::default()
    }

    #[test]
    fn infinite_force_is_discarded() {
        let clamp = clamp_gravitational_force(
            Vec3::new(f64::INFINITY, 0.0, 0.0),
            10.0,
            None,
            &config(),
        );
        assert_eq!(clamp.force, Vec3::ZERO);
        assert_eq!(clamp.outcome, ForceOutcome::Discarded);
    }

    #[test]
    fn excessive_force_is_limited_preserving_direction() {
        let c = config();
        let force = Vec3::new(0.0, -1.0e9, 0.0);
        let clamp = clamp_gravitational_force(force, 1000.0, Some(5.0), &c);
        assert!(matches!(clamp.outcome, ForceOutcome::Limited { .. }));
        assert!((g_force(&clamp.force, 1000.0) - 5.0).abs() < 1e-9);
        assert!(clamp.force.x.abs() < 1e-12);
        assert!(clamp.force.y < 0.0);
    }

    #[test]
    fn overflowing_force_is_limited_not_zeroed() {
        let c = config();
        let clamp = clamp_gravitational_force(Vec3::new(1.0e200, 0.0, 0.0), 10.0, None, &c);
        assert!(matches!(clamp.outcome, ForceOutcome::Limited { .. }));
        let expected = c.max_g_force * STANDARD_GRAVITY * 10.0;
        assert!((clamp.force.x - expected).abs() < 1e-6);
        assert_eq!(clamp.force.y, 0.0);
        assert_eq!(clamp.force.z, 0.0);
    }

    #[test]
    fn override_is_floored() {
        let c = config();
        let clamp = clamp_gravitational_force(Vec3::new(100.0, 0.0, 0.0), 1.0, Some(0.0), &c);
        assert!((g_force(&clamp.force, 1.0) - MIN_G_CAP).abs() < 1e-9);
    }

    #[test]
    fn small_force_and_massless_pass_through() {
        let c = config();
        let force = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(
            clamp_gravitational_force(force, 100.0, None, &c).outcome,
            ForceOutcome::Unchanged
        );
        let huge = Vec3::new(1e20, 0.0, 0.0);
        assert_eq!(clamp_gravitational_force(huge, 0.0, None, &c).force, huge);
    }

    #[test]
    fn safe_limit_predicate() {
        let c = config();
        assert!(is_force_within_safe_limits(&Vec3::new(9.8, 0.0, 0.0), 1.0, &c));
        assert!(!is_force_within_safe_limits(&Vec3::new(1e6, 0.0, 0.0), 1.0, &c));
        assert!(!is_force_within_safe_limits(
            &Vec3::new(f64::NAN, 0.0, 0.0),
            1.0,
            &c
        ));
    }

    #[test]
    fn velocity_ceiling_tightens_with_scale() {
        let c = config();
        assert_eq!(max_safe_velocity(1.0, &c), c.max_safe_velocity_ms);
        assert_eq!(max_safe_velocity(0.01, &c), c.max_safe_velocity_ms);
        assert_eq!(max_safe_velocity(10.0, &c), c.max_safe_velocity_ms / 10.0);
        assert_eq!(max_safe_velocity(1e6, &c), MIN_SAFE_VELOCITY);
        assert_eq!(max_safe_velocity(f64::NAN, &c), c.max_safe_velocity_ms);
    }

    #[test]
    fn velocity_clamp() {
        let c = config();
        let (v, outcome) = clamp_velocity(Vec3::new(0.0, 0.0, 1e6), 1.0, &c);
        assert!(matches!(outcome, VelocityOutcome::Limited { .. }));
        assert!((v.length() - c.max_safe_velocity_ms).abs() < 1e-6);

        let (v, outcome) = clamp_velocity(Vec3::new(f64::NAN, 0.0, 0.0), 1.0, &c);
        assert_eq!(v, Vec3::ZERO);
        assert_eq!(outcome, VelocityOutcome::Discarded);
    }
}
