//! Session-wide safety configuration.
//!
//! A [`SafetyConfiguration`] is built once when the safety system starts and
//! is read-only afterwards. Every field has a default so a partial JSON
//! document (see `data/safety_config.json`) deserializes cleanly.

use serde::{Deserialize, Serialize};

/// Numeric bounds and feature flags for the whole safety subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfiguration {
    /// Smallest scale factor any local frame may use.
    pub min_scale_factor: f64,
    /// Largest scale factor any local frame may use.
    pub max_scale_factor: f64,
    /// Distance (metres) at which the safe scale factor is exactly 1.0.
    pub reference_distance: f64,
    /// Ceiling on gravitational acceleration, in multiples of standard gravity.
    pub max_g_force: f64,
    /// Velocity ceiling (m/s) at a scale factor of 1.0.
    pub max_safe_velocity_ms: f64,
    /// Position magnitude (metres) beyond which precision loss is reported.
    pub precision_warning_distance: f64,
    /// Position magnitude (metres) beyond which the origin must be recentered.
    pub emergency_recenter_distance: f64,
    /// Largest client/server divergence (physical units) treated as in sync.
    pub network_desync_tolerance: f64,
    /// Divergence above which a desync is logged as an Error.
    pub desync_error_distance: f64,
    /// Divergence above which a desync is Critical and fully corrected.
    pub desync_critical_distance: f64,
    /// Capacity of the in-memory event log.
    pub max_event_log_size: usize,
    /// Engine units per metre (100 for centimetre worlds).
    pub units_per_meter: f64,
    pub safety_checks_enabled: bool,
    pub auto_recovery_enabled: bool,
    /// Emit Info events for routine clamps.
    pub verbose_logging: bool,
    pub consensus: ConsensusConfig,
}

/// Tolerances for the multi-observer consensus check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Fixed part of the allowed RMS geometric error, in measurement units.
    pub absolute_tolerance: f64,
    /// Part of the allowed error proportional to the mean reported distance.
    pub relative_tolerance: f64,
    /// Highest confidence a two-observer set can ever report.
    pub two_observer_confidence_cap: f64,
    /// Gauss-Newton iterations for the multilateration solve.
    pub max_solver_iterations: u32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1.0,
            relative_tolerance: 1e-3,
            two_observer_confidence_cap: 0.25,
            max_solver_iterations: 25,
        }
    }
}

impl Default for SafetyConfiguration {
    fn default() -> Self {
        Self {
            min_scale_factor: 1e-4,
            max_scale_factor: 1e4,
            reference_distance: 1_000_000.0,     // 1000 km
            max_g_force: 50.0,
            max_safe_velocity_ms: 50_000.0,
            precision_warning_distance: 100_000.0, // 100 km
            emergency_recenter_distance: 1_000_000.0,
            network_desync_tolerance: 1.0,
            desync_error_distance: 50.0,
            desync_critical_distance: 100.0,
            max_event_log_size: 1000,
            units_per_meter: 100.0,
            safety_checks_enabled: true,
            auto_recovery_enabled: true,
            verbose_logging: false,
            consensus: ConsensusConfig::default(),
        }
    }
}

impl SafetyConfiguration {
    /// Check the configuration for values no guard can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_scale_factor", self.min_scale_factor),
            ("max_scale_factor", self.max_scale_factor),
            ("reference_distance", self.reference_distance),
            ("max_g_force", self.max_g_force),
            ("max_safe_velocity_ms", self.max_safe_velocity_ms),
            ("precision_warning_distance", self.precision_warning_distance),
            ("emergency_recenter_distance", self.emergency_recenter_distance),
            ("units_per_meter", self.units_per_meter),
            ("consensus.absolute_tolerance", self.consensus.absolute_tolerance),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let non_negative = [
            ("network_desync_tolerance", self.network_desync_tolerance),
            ("consensus.relative_tolerance", self.consensus.relative_tolerance),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if self.min_scale_factor > self.max_scale_factor {
            return Err(ConfigError::InvertedRange {
                low: "min_scale_factor",
                high: "max_scale_factor",
            });
        }
        if self.precision_warning_distance > self.emergency_recenter_distance {
            return Err(ConfigError::InvertedRange {
                low: "precision_warning_distance",
                high: "emergency_recenter_distance",
            });
        }
        if !(self.network_desync_tolerance <= self.desync_error_distance
            && self.desync_error_distance <= self.desync_critical_distance)
        {
            return Err(ConfigError::InvertedRange {
                low: "network_desync_tolerance",
                high: "desync_critical_distance",
            });
        }
        if self.max_event_log_size == 0 {
            return Err(ConfigError::EmptyEventLog);
        }
        if !(0.0..=1.0).contains(&self.consensus.two_observer_confidence_cap) {
            return Err(ConfigError::OutOfUnitRange {
                field: "consensus.two_observer_confidence_cap",
                value: self.consensus.two_observer_confidence_cap,
            });
        }
        Ok(())
    }

    /// Convert an engine-unit length to metres.
    pub fn to_meters(&self, units: f64) -> f64 {
        units / self.units_per_meter
    }
}

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NotPositive { field: &'static str, value: f64 },
    Negative { field: &'static str, value: f64 },
    InvertedRange { low: &'static str, high: &'static str },
    OutOfUnitRange { field: &'static str, value: f64 },
    EmptyEventLog,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotPositive { field, value } => {
                write!(f, "{} must be positive and finite, got {}", field, value)
            }
            ConfigError::Negative { field, value } => {
                write!(f, "{} must be non-negative and finite, got {}", field, value)
            }
            ConfigError::InvertedRange { low, high } => {
                write!(f, "{} must not exceed {}", low, high)
            }
            ConfigError::OutOfUnitRange { field, value } => {
                write!(f, "{} must lie in [0, 1], got {}", field, value)
            }
            ConfigError::EmptyEventLog => write!(f, "max_event_log_size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}
