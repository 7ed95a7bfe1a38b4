//! Floating-point precision monitor.
//!
//! Positions arrive in engine units and are converted to metres before any
//! threshold comparison. Nothing here logs; callers decide what a precision
//! finding means for them.

use crate::config::SafetyConfiguration;
use crate::vector::Vec3;

/// Finest tolerance handed out, in metres (1 cm).
pub const PRECISION_FLOOR: f64 = 0.01;
/// Coarsest tolerance handed out, in metres (1 m).
pub const PRECISION_CEILING: f64 = 1.0;
/// Distances up to 10^3 m get the floor tolerance.
const FLOOR_DECADE: f64 = 3.0;
/// Distances from 10^7 m get the ceiling tolerance.
const CEILING_DECADE: f64 = 7.0;

/// Values whose magnitude is below this are treated as zero.
const NEAR_ZERO: f64 = 1e-12;

/// Position magnitude in metres.
fn magnitude_meters(position: &Vec3, config: &SafetyConfiguration) -> f64 {
    config.to_meters(position.length())
}

/// True when the position is far enough out to threaten precision.
///
/// Non-finite positions always count as a precision error.
pub fn detect_precision_error(position: &Vec3, config: &SafetyConfiguration) -> bool {
    if !position.is_finite() {
        return true;
    }
    magnitude_meters(position, config) > config.precision_warning_distance
}

/// Relative error (percent) between a wide reference value and its narrow copy.
pub fn calculate_floating_point_error(high_precision: f64, low_precision: f32) -> f64 {
    if high_precision.abs() < NEAR_ZERO {
        return 0.0;
    }
    let low = f64::from(low_precision);
    if !low.is_finite() || !high_precision.is_finite() {
        return 100.0;
    }
    100.0 * (high_precision - low).abs() / high_precision.abs()
}

/// Strict safe/unsafe gate: finite and strictly inside the warning distance.
pub fn is_position_precision_safe(position: &Vec3, config: &SafetyConfiguration) -> bool {
    position.is_finite() && magnitude_meters(position, config) < config.precision_warning_distance
}

/// True when the position is beyond the emergency recenter distance.
pub fn needs_emergency_recenter(position: &Vec3, config: &SafetyConfiguration) -> bool {
    !position.is_finite() || magnitude_meters(position, config) > config.emergency_recenter_distance
}

/// Distance-appropriate equality tolerance in metres.
///
/// Interpolates logarithmically from 1 cm at 1 km (and closer) to 1 m at
/// 10 000 km (and beyond).
pub fn precision_threshold(distance_from_origin: f64) -> f64 {
    if !distance_from_origin.is_finite() {
        return PRECISION_CEILING;
    }
    let decade = distance_from_origin.max(1.0).log10();
    let t = ((decade - FLOOR_DECADE) / (CEILING_DECADE - FLOOR_DECADE)).clamp(0.0, 1.0);
    PRECISION_FLOOR * (PRECISION_CEILING / PRECISION_FLOOR).powf(t)
}
