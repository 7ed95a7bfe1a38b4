//! Recovery coordinator - corrective actions and the per-entity safety state machine.
//!
//! ```text
//! Stable ──violation──▶ Degraded ──auto-recovery──▶ Recovering ──▶ Stable
//!                                                        │
//!                                                        └──▶ WorldSpaceFallback (terminal)
//! ```
//!
//! A violation is a corrupt physics state (non-finite position, rotation or
//! velocity) or a position outside the precision-safe radius. Recovery
//! repairs corrupt state first. An entity that is still imprecise stays
//! Degraded until it passes the emergency recenter distance; then the origin
//! is recentered if that alone brings the entity back inside the safe
//! radius, otherwise the entity drops to absolute world-space coordinates
//! until re-enabled explicitly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::SafetyConfiguration;
use crate::events::SafetySeverity;
use crate::precision::{is_position_precision_safe, needs_emergency_recenter};
use crate::vector::{Rotator, Vec3};

/// Narrow view of a simulated body.
pub trait PhysicsEntity {
    /// Stable, unique key for status tracking.
    fn key(&self) -> u64;
    /// Human-readable name for event messages. Need not be unique.
    fn identifier(&self) -> &str;
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    fn rotation(&self) -> Rotator;
    fn set_rotation(&mut self, rotation: Rotator);
    /// `None` for entities without a velocity.
    fn velocity(&self) -> Option<Vec3> {
        None
    }
    fn set_velocity(&mut self, _velocity: Vec3) {}
    /// Toggle origin-centred physics; `false` means absolute, unscaled coordinates.
    fn set_origin_relative(&mut self, enabled: bool);
}

/// The collaborator that owns the observer-relative coordinate origin.
///
/// Implementations must not call back into the safety system from
/// `recenter_on_observer`; it runs while the system's state is locked.
pub trait OriginManager {
    /// Move the origin onto the current observer, translating everything else.
    fn recenter_on_observer(&mut self);
    /// Current observer position in the same frame as entity positions.
    fn observer_position(&self) -> Vec3;
}

/// Where the event and counter side effects of a recovery action go.
pub trait EventSink {
    fn log_event(&mut self, message: String, severity: SafetySeverity, subject: Option<&str>);
    fn record_recovery(&mut self);
}

/// Safety status of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafetyStatus {
    Stable,
    Degraded,
    Recovering,
    /// Terminal until [`RecoveryCoordinator::reenable_origin_physics`].
    WorldSpaceFallback,
}

/// Tracks per-entity status and performs recovery actions.
#[derive(Debug, Clone, Default)]
pub struct RecoveryCoordinator {
    statuses: HashMap<u64, SafetyStatus>,
}

impl RecoveryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known status; unseen entities are Stable.
    pub fn status(&self, key: u64) -> SafetyStatus {
        self.statuses
            .get(&key)
            .copied()
            .unwrap_or(SafetyStatus::Stable)
    }

    pub fn tracked_count(&self) -> usize {
        self.statuses.len()
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }

    /// Drop the entry for an entity that no longer exists.
    pub fn forget(&mut self, key: u64) -> Option<SafetyStatus> {
        self.statuses.remove(&key)
    }

    /// Reinstate a status recorded elsewhere, e.g. after a scene load.
    pub fn restore(&mut self, key: u64, status: SafetyStatus) {
        self.set_status(key, status);
    }

    fn set_status(&mut self, key: u64, status: SafetyStatus) {
        self.statuses.insert(key, status);
    }

    /// Recenter the observer-relative universe. A missing manager is logged and skipped.
    pub fn trigger_emergency_recenter(
        &mut self,
        sink: &mut dyn EventSink,
        origin: Option<&mut dyn OriginManager>,
    ) -> bool {
        let Some(origin) = origin else {
            sink.log_event(
                "Emergency recenter requested without an origin manager".into(),
                SafetySeverity::Error,
                None,
            );
            return false;
        };
        sink.log_event(
            "Emergency origin recenter around current observer".into(),
            SafetySeverity::Critical,
            None,
        );
        origin.recenter_on_observer();
        sink.record_recovery();
        true
    }

    /// Put an entity on absolute coordinates until it is re-enabled.
    pub fn fallback_to_world_space_mode(
        &mut self,
        sink: &mut dyn EventSink,
        entity: &mut dyn PhysicsEntity,
        reason: &str,
    ) {
        sink.log_event(
            format!("Falling back to world-space coordinates: {}", reason),
            SafetySeverity::Critical,
            Some(entity.identifier()),
        );
        entity.set_origin_relative(false);
        self.set_status(entity.key(), SafetyStatus::WorldSpaceFallback);
        sink.record_recovery();
    }

    /// Leave world-space fallback and resume origin-relative physics.
    pub fn reenable_origin_physics(
        &mut self,
        sink: &mut dyn EventSink,
        entity: &mut dyn PhysicsEntity,
    ) {
        entity.set_origin_relative(true);
        self.set_status(entity.key(), SafetyStatus::Stable);
        sink.log_event(
            "Origin-relative physics re-enabled".into(),
            SafetySeverity::Info,
            Some(entity.identifier()),
        );
    }

    /// Zero position, rotation and velocity unconditionally.
    pub fn reset_actor_to_safe_state(
        &mut self,
        sink: &mut dyn EventSink,
        entity: &mut dyn PhysicsEntity,
    ) {
        entity.set_position(Vec3::ZERO);
        entity.set_rotation(Rotator::IDENTITY);
        if entity.velocity().is_some() {
            entity.set_velocity(Vec3::ZERO);
        }
        sink.log_event(
            "Entity reset to safe state".into(),
            SafetySeverity::Warning,
            Some(entity.identifier()),
        );
        sink.record_recovery();
    }

    /// Repair non-finite position, rotation and velocity. Returns whether anything changed.
    ///
    /// Valid state is left untouched and produces no events.
    pub fn validate_and_repair_physics_state(
        &mut self,
        sink: &mut dyn EventSink,
        entity: &mut dyn PhysicsEntity,
    ) -> bool {
        let mut repaired = false;

        if !entity.position().is_finite() {
            entity.set_position(Vec3::ZERO);
            sink.log_event(
                "Non-finite position repaired to origin".into(),
                SafetySeverity::Error,
                Some(entity.identifier()),
            );
            repaired = true;
        }
        if !entity.rotation().is_finite() {
            entity.set_rotation(Rotator::IDENTITY);
            sink.log_event(
                "Non-finite rotation repaired to identity".into(),
                SafetySeverity::Error,
                Some(entity.identifier()),
            );
            repaired = true;
        }
        if let Some(velocity) = entity.velocity() {
            if !velocity.is_finite() {
                entity.set_velocity(Vec3::ZERO);
                sink.log_event(
                    "Non-finite velocity repaired to zero".into(),
                    SafetySeverity::Error,
                    Some(entity.identifier()),
                );
                repaired = true;
            }
        }
        repaired
    }

    /// Run one pass of the state machine for `entity`.
    pub fn evaluate_entity(
        &mut self,
        sink: &mut dyn EventSink,
        config: &SafetyConfiguration,
        entity: &mut dyn PhysicsEntity,
        origin: Option<&mut dyn OriginManager>,
    ) -> SafetyStatus {
        let previous = self.status(entity.key());
        if previous == SafetyStatus::WorldSpaceFallback {
            return previous;
        }

        let corrupt = !entity.position().is_finite()
            || !entity.rotation().is_finite()
            || entity.velocity().is_some_and(|v| !v.is_finite());
        let imprecise = !is_position_precision_safe(&entity.position(), config);

        if !corrupt && !imprecise {
            if previous != SafetyStatus::Stable {
                sink.log_event(
                    "Entity returned to stable state".into(),
                    SafetySeverity::Info,
                    Some(entity.identifier()),
                );
            }
            self.set_status(entity.key(), SafetyStatus::Stable);
            return SafetyStatus::Stable;
        }

        if previous == SafetyStatus::Stable {
            sink.log_event(
                format!(
                    "Entity degraded ({})",
                    if corrupt { "corrupt physics state" } else { "precision loss" }
                ),
                SafetySeverity::Warning,
                Some(entity.identifier()),
            );
        }
        self.set_status(entity.key(), SafetyStatus::Degraded);
        if !config.auto_recovery_enabled {
            return SafetyStatus::Degraded;
        }

        self.set_status(entity.key(), SafetyStatus::Recovering);
        if corrupt {
            self.validate_and_repair_physics_state(sink, entity);
        }

        if is_position_precision_safe(&entity.position(), config) {
            self.set_status(entity.key(), SafetyStatus::Stable);
            return SafetyStatus::Stable;
        }
        if !needs_emergency_recenter(&entity.position(), config) {
            // Imprecise but not yet an emergency: keep flagging, act later.
            self.set_status(entity.key(), SafetyStatus::Degraded);
            return SafetyStatus::Degraded;
        }

        // Recentering only helps if the entity is close to the observer.
        let recenter_helps = origin.as_ref().is_some_and(|o| {
            is_position_precision_safe(&(entity.position() - o.observer_position()), config)
        });
        if recenter_helps && self.trigger_emergency_recenter(sink, origin) {
            self.set_status(entity.key(), SafetyStatus::Stable);
            return SafetyStatus::Stable;
        }

        self.fallback_to_world_space_mode(
            sink,
            entity,
            "origin recenter cannot restore precision",
        );
        SafetyStatus::WorldSpaceFallback
    }
}
