//! Network desync monitor.
//!
//! Compares the client's view of a tracked object with the server's,
//! grades the divergence, and proposes a blend weight so the reconciliation
//! layer can ease small errors out instead of snapping.
//!
//! | Divergence (physical units) | Severity |
//! |-----------------------------|----------|
//! | > `desync_critical_distance` (100) | Critical |
//! | > `desync_error_distance` (50) | Error |
//! | > `network_desync_tolerance` | Warning |
//! | otherwise | Info |

use serde::{Deserialize, Serialize};

use crate::config::SafetyConfiguration;
use crate::events::SafetySeverity;
use crate::vector::Vec3;

/// Graded client/server divergence for one object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesyncReport {
    /// Divergence in physical units; infinite if either position is corrupt.
    pub error_distance: f64,
    pub severity: SafetySeverity,
    pub correction_strength: f64,
}

/// Explicit message the server sends to pull a client back in line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionCorrection {
    pub entity_id: u64,
    /// Monotonic per-entity sequence number; stale corrections are dropped.
    pub sequence: u32,
    /// Authoritative position in engine units.
    pub server_position: Vec3,
    /// Blend weight in [0, 1].
    pub strength: f64,
}

impl PositionCorrection {
    /// Client position after applying this correction.
    pub fn apply(&self, client_position: Vec3) -> Vec3 {
        if !client_position.is_finite() {
            return self.server_position;
        }
        client_position.lerp(&self.server_position, self.strength)
    }
}

/// Severity ladder for a divergence.
pub fn classify_desync(error_distance: f64, config: &SafetyConfiguration) -> SafetySeverity {
    if !(error_distance <= config.desync_critical_distance) {
        SafetySeverity::Critical
    } else if error_distance > config.desync_error_distance {
        SafetySeverity::Error
    } else if error_distance > config.network_desync_tolerance {
        SafetySeverity::Warning
    } else {
        SafetySeverity::Info
    }
}

pub fn is_desync_acceptable(error_distance: f64, config: &SafetyConfiguration) -> bool {
    error_distance <= config.network_desync_tolerance
}

/// Blend weight: 0 up to the tolerance, 1 from the critical distance, linear between.
pub fn network_correction_strength(error_distance: f64, config: &SafetyConfiguration) -> f64 {
    let low = config.network_desync_tolerance;
    let high = config.desync_critical_distance;
    if error_distance.is_nan() {
        return 1.0;
    }
    if error_distance <= low {
        return 0.0;
    }
    if error_distance >= high || high <= low {
        return 1.0;
    }
    ((error_distance - low) / (high - low)).clamp(0.0, 1.0)
}

/// Measure and grade the divergence between two engine-unit positions.
pub fn assess_desync(
    client_position: &Vec3,
    server_position: &Vec3,
    config: &SafetyConfiguration,
) -> DesyncReport {
    let error_distance = if client_position.is_finite() && server_position.is_finite() {
        config.to_meters(client_position.distance(server_position))
    } else {
        f64::INFINITY
    };
    DesyncReport {
        error_distance,
        severity: classify_desync(error_distance, config),
        correction_strength: network_correction_strength(error_distance, config),
    }
}

/// Build the correction message for a report, or `None` when no blend is needed.
pub fn plan_correction(
    entity_id: u64,
    sequence: u32,
    server_position: Vec3,
    report: &DesyncReport,
) -> Option<PositionCorrection> {
    if report.correction_strength <= 0.0 {
        return None;
    }
    Some(PositionCorrection {
        entity_id,
        sequence,
        server_position,
        strength: report.correction_strength,
    })
}
