//! The safety system service object.
//!
//! [`CelestialSafetySystem`] bundles the configuration, the event log, the
//! statistics and the recovery coordinator behind one mutex, so it can be
//! shared through an `Arc` by the simulation loop and a network thread
//! alike. Every method takes `&self`.
//!
//! # Example
//!
//! ```
//! use skyscale_logic::prelude::*;
//!
//! let safety = CelestialSafetySystem::init(SafetyConfiguration::default()).unwrap();
//! assert_eq!(safety.clamp_scale_factor(f64::NAN), 1e-4);
//! assert_eq!(safety.statistics().total_events, 1);
//! ```

use std::sync::{Mutex, MutexGuard};

use crate::config::{ConfigError, SafetyConfiguration};
use crate::consensus::{ConsensusResult, ObserverMeasurement, TriangulationConsensusValidator};
use crate::desync::{self, DesyncReport};
use crate::events::{dispatch_to_log, SafetyEvent, SafetyEventLog, SafetySeverity, SafetyStatistics};
use crate::force::{self, ForceOutcome, VelocityOutcome};
use crate::precision;
use crate::recovery::{EventSink, OriginManager, PhysicsEntity, RecoveryCoordinator, SafetyStatus};
use crate::scale::{self, ClampOutcome};
use crate::vector::Vec3;

/// Log, counters and clock; the part every component writes to.
#[derive(Debug)]
struct Journal {
    log: SafetyEventLog,
    stats: SafetyStatistics,
    clock: f64,
    verbose: bool,
}

impl EventSink for Journal {
    fn log_event(&mut self, message: String, severity: SafetySeverity, subject: Option<&str>) {
        let event = SafetyEvent {
            severity,
            message,
            subject: subject.map(str::to_string),
            timestamp: self.clock,
        };
        dispatch_to_log(&event, self.verbose);
        self.stats.record(&event);
        self.log.push(event);
    }

    fn record_recovery(&mut self) {
        self.stats.recovery_operations += 1;
    }
}

#[derive(Debug)]
struct SafetyState {
    journal: Journal,
    coordinator: RecoveryCoordinator,
    initialized: bool,
}

/// Process-wide scaling safety and consensus service.
#[derive(Debug)]
pub struct CelestialSafetySystem {
    config: SafetyConfiguration,
    validator: TriangulationConsensusValidator,
    state: Mutex<SafetyState>,
}

impl CelestialSafetySystem {
    /// Validate the configuration and start the subsystem.
    pub fn init(config: SafetyConfiguration) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Safety system initialized (scale [{}, {}], max {} g, log capacity {})",
            config.min_scale_factor,
            config.max_scale_factor,
            config.max_g_force,
            config.max_event_log_size
        );
        Ok(Self {
            validator: TriangulationConsensusValidator::new(&config),
            state: Mutex::new(SafetyState {
                journal: Journal {
                    log: SafetyEventLog::new(config.max_event_log_size),
                    stats: SafetyStatistics::default(),
                    clock: 0.0,
                    verbose: config.verbose_logging,
                },
                coordinator: RecoveryCoordinator::new(),
                initialized: true,
            }),
            config,
        })
    }

    /// Stop the subsystem. Queries keep working; the log and statistics stay readable.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if state.initialized {
            state.initialized = false;
            log::info!(
                "Safety system shut down after {} events, {} recoveries",
                state.journal.stats.total_events,
                state.journal.stats.recovery_operations
            );
        }
    }

    /// Reset log, statistics, clock and tracked statuses, and mark the system running.
    pub fn reinitialize(&self) {
        let mut state = self.lock();
        state.journal.log.clear();
        state.journal.stats = SafetyStatistics::default();
        state.journal.clock = 0.0;
        state.coordinator.clear();
        state.initialized = true;
        log::info!("Safety system reinitialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    pub fn configuration(&self) -> &SafetyConfiguration {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, SafetyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ── Clock ──────────────────────────────────────────────────────────

    /// Advance the timestamp used for new events by `delta_seconds`.
    pub fn advance_clock(&self, delta_seconds: f64) {
        if delta_seconds.is_finite() && delta_seconds > 0.0 {
            self.lock().journal.clock += delta_seconds;
        }
    }

    pub fn set_clock(&self, seconds: f64) {
        if seconds.is_finite() {
            self.lock().journal.clock = seconds;
        }
    }

    pub fn clock(&self) -> f64 {
        self.lock().journal.clock
    }

    // ── Event log ──────────────────────────────────────────────────────

    /// The universal diagnostic sink.
    pub fn log_safety_event(&self, message: &str, severity: SafetySeverity, subject: Option<&str>) {
        self.lock()
            .journal
            .log_event(message.to_string(), severity, subject);
    }

    pub fn recent_safety_events(&self, count: usize) -> Vec<SafetyEvent> {
        self.lock().journal.log.recent(count)
    }

    pub fn events_with_severity(&self, min: SafetySeverity) -> Vec<SafetyEvent> {
        self.lock().journal.log.with_severity(min)
    }

    pub fn event_count(&self) -> usize {
        self.lock().journal.log.len()
    }

    /// Empty the log. Statistics are not touched.
    pub fn clear_event_log(&self) {
        self.lock().journal.log.clear();
    }

    pub fn statistics(&self) -> SafetyStatistics {
        self.lock().journal.stats
    }

    // ── Scale guard ────────────────────────────────────────────────────

    pub fn clamp_scale_factor(&self, factor: f64) -> f64 {
        let clamp = scale::clamp_scale_factor(factor, &self.config);
        match clamp.outcome {
            ClampOutcome::Unchanged => {}
            ClampOutcome::Replaced => self.log_safety_event(
                &format!(
                    "Invalid scale factor {} replaced with {}",
                    factor, clamp.value
                ),
                SafetySeverity::Warning,
                None,
            ),
            ClampOutcome::Clamped if self.config.verbose_logging => self.log_safety_event(
                &format!("Scale factor {} clamped to {}", factor, clamp.value),
                SafetySeverity::Info,
                None,
            ),
            ClampOutcome::Clamped => {}
        }
        clamp.value
    }

    pub fn is_valid_scale_factor(&self, factor: f64) -> bool {
        scale::is_valid_scale_factor(factor, &self.config)
    }

    /// Deterministic and side-effect free.
    pub fn safe_scale_factor(&self, distance: f64) -> f64 {
        scale::safe_scale_factor(distance, &self.config)
    }

    // ── Force guard ────────────────────────────────────────────────────

    pub fn clamp_gravitational_force(
        &self,
        force: Vec3,
        target_mass: f64,
        max_g_override: Option<f64>,
    ) -> Vec3 {
        let clamp = force::clamp_gravitational_force(force, target_mass, max_g_override, &self.config);
        match clamp.outcome {
            ForceOutcome::Unchanged => {}
            ForceOutcome::Discarded => self.log_safety_event(
                "Non-finite gravitational force discarded",
                SafetySeverity::Error,
                None,
            ),
            ForceOutcome::Limited { g_force } if self.config.verbose_logging => self
                .log_safety_event(
                    &format!("Gravitational force limited from {:.2} g", g_force),
                    SafetySeverity::Info,
                    None,
                ),
            ForceOutcome::Limited { .. } => {}
        }
        clamp.force
    }

    pub fn is_force_within_safe_limits(&self, force: &Vec3, mass: f64) -> bool {
        force::is_force_within_safe_limits(force, mass, &self.config)
    }

    pub fn max_safe_velocity(&self, scale_factor: f64) -> f64 {
        force::max_safe_velocity(scale_factor, &self.config)
    }

    /// Limit a velocity (m/s) to the ceiling for `scale_factor`.
    pub fn clamp_velocity(&self, velocity: Vec3, scale_factor: f64, subject: Option<&str>) -> Vec3 {
        let (clamped, outcome) = force::clamp_velocity(velocity, scale_factor, &self.config);
        match outcome {
            VelocityOutcome::Unchanged => {}
            VelocityOutcome::Limited { speed } => self.log_safety_event(
                &format!(
                    "Velocity {:.1} m/s limited to {:.1} m/s",
                    speed,
                    clamped.length()
                ),
                SafetySeverity::Warning,
                subject,
            ),
            VelocityOutcome::Discarded => self.log_safety_event(
                "Non-finite velocity discarded",
                SafetySeverity::Error,
                subject,
            ),
        }
        clamped
    }

    // ── Precision monitor ──────────────────────────────────────────────

    pub fn detect_precision_error(&self, position: &Vec3) -> bool {
        precision::detect_precision_error(position, &self.config)
    }

    pub fn calculate_floating_point_error(&self, high_precision: f64, low_precision: f32) -> f64 {
        precision::calculate_floating_point_error(high_precision, low_precision)
    }

    pub fn is_position_precision_safe(&self, position: &Vec3) -> bool {
        precision::is_position_precision_safe(position, &self.config)
    }

    pub fn precision_threshold(&self, distance_from_origin: f64) -> f64 {
        precision::precision_threshold(distance_from_origin)
    }

    // ── Recovery coordinator ───────────────────────────────────────────

    pub fn trigger_emergency_recenter(&self, origin: Option<&mut dyn OriginManager>) -> bool {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.trigger_emergency_recenter(journal, origin)
    }

    pub fn fallback_to_world_space_mode(&self, entity: &mut dyn PhysicsEntity, reason: &str) {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.fallback_to_world_space_mode(journal, entity, reason);
    }

    pub fn reenable_origin_physics(&self, entity: &mut dyn PhysicsEntity) {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.reenable_origin_physics(journal, entity);
    }

    pub fn reset_actor_to_safe_state(&self, entity: &mut dyn PhysicsEntity) {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.reset_actor_to_safe_state(journal, entity);
    }

    /// Safe to call every tick; valid state is left alone.
    pub fn validate_and_repair_physics_state(&self, entity: &mut dyn PhysicsEntity) -> bool {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.validate_and_repair_physics_state(journal, entity)
    }

    /// Drive the recovery state machine for one entity.
    pub fn evaluate_entity(
        &self,
        entity: &mut dyn PhysicsEntity,
        origin: Option<&mut dyn OriginManager>,
    ) -> SafetyStatus {
        let mut state = self.lock();
        let SafetyState {
            journal,
            coordinator,
            ..
        } = &mut *state;
        coordinator.evaluate_entity(journal, &self.config, entity, origin)
    }

    pub fn entity_status(&self, key: u64) -> SafetyStatus {
        self.lock().coordinator.status(key)
    }

    /// Stop tracking an entity that has been removed from the simulation.
    pub fn forget_entity(&self, key: u64) {
        self.lock().coordinator.forget(key);
    }

    /// Reinstate a tracked status without logging, e.g. after a scene load.
    pub fn restore_status(&self, key: u64, status: SafetyStatus) {
        self.lock().coordinator.restore(key, status);
    }

    // ── Network desync monitor ─────────────────────────────────────────

    /// Grade and log a client/server divergence; always counts as a desync event.
    pub fn log_network_desync(
        &self,
        subject: &str,
        client_position: &Vec3,
        server_position: &Vec3,
    ) -> DesyncReport {
        let report = desync::assess_desync(client_position, server_position, &self.config);
        let mut state = self.lock();
        state.journal.log_event(
            format!(
                "Network desync of {:.2} units (correction {:.2})",
                report.error_distance, report.correction_strength
            ),
            report.severity,
            Some(subject),
        );
        state.journal.stats.desync_events += 1;
        report
    }

    pub fn is_desync_acceptable(&self, error_distance: f64) -> bool {
        desync::is_desync_acceptable(error_distance, &self.config)
    }

    pub fn network_correction_strength(&self, error_distance: f64) -> f64 {
        desync::network_correction_strength(error_distance, &self.config)
    }

    // ── Consensus ──────────────────────────────────────────────────────

    /// Run the stateless validator; inconsistent sets are logged and counted.
    pub fn validate_position(&self, measurements: &[ObserverMeasurement]) -> ConsensusResult {
        let result = self.validator.validate_position(measurements);
        if !result.valid {
            let mut state = self.lock();
            state.journal.log_event(
                format!(
                    "Observer consensus failed: {} observers, error {:.3} ({:?})",
                    result.observer_count, result.geometric_error, result.rejection
                ),
                SafetySeverity::Warning,
                None,
            );
            state.journal.stats.consensus_failures += 1;
        }
        result
    }

    pub fn validator(&self) -> &TriangulationConsensusValidator {
        &self.validator
    }
}
