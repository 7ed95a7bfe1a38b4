//! Safety engine - main entry point for running a guarded scene

use std::sync::Arc;

use hecs::{Entity, World};
use skyscale_logic::config::{ConfigError, SafetyConfiguration};
use skyscale_logic::desync::PositionCorrection;
use skyscale_logic::recovery::SafetyStatus;
use skyscale_logic::safety::CelestialSafetySystem;
use skyscale_logic::vector::Vec3;

use crate::components::*;
use crate::entity::{status_key, BodySnapshot};
use crate::net::{CorrectionSequencer, NetError};
use crate::origin::FloatingOrigin;
use crate::persistence::SaveError;
use crate::systems::*;

/// Main simulation engine
pub struct SafetyEngine {
    /// ECS world containing all bodies
    pub world: World,
    /// Observer-relative origin; shifts are applied during the integrity pass
    pub origin: FloatingOrigin,
    safety: Arc<CelestialSafetySystem>,
    sequencer: CorrectionSequencer,
    /// Simulation time in seconds since start
    sim_time: f64,
    time_scale: f64,
    last_integrity: IntegrityReport,
}

impl SafetyEngine {
    /// Create an empty scene with its own safety system
    pub fn new(config: SafetyConfiguration) -> Result<Self, ConfigError> {
        Ok(Self::with_safety(Arc::new(CelestialSafetySystem::init(config)?)))
    }

    /// Create an empty scene sharing an existing safety system
    pub fn with_safety(safety: Arc<CelestialSafetySystem>) -> Self {
        Self {
            world: World::new(),
            origin: FloatingOrigin::new(),
            safety,
            sequencer: CorrectionSequencer::new(),
            sim_time: 0.0,
            time_scale: 1.0,
            last_integrity: IntegrityReport::default(),
        }
    }

    pub fn safety(&self) -> &Arc<CelestialSafetySystem> {
        &self.safety
    }

    // ── Scene building ─────────────────────────────────────────────────

    /// Spawn a free body. Position in engine units, velocity in units/s, mass in kg.
    pub fn spawn_body(&mut self, name: &str, position: Vec3, velocity: Vec3, mass: f64) -> Entity {
        self.world.spawn((
            Name::new(name),
            Transform::at(position),
            Velocity(velocity),
            Mass(mass),
            FrameMode::default(),
            LocalScale::default(),
        ))
    }

    /// Spawn a fixed attractor.
    pub fn spawn_gravity_well(&mut self, name: &str, position: Vec3, mass: f64) -> Entity {
        self.world.spawn((
            Name::new(name),
            Transform::at(position),
            GravityWell { mass },
            FrameMode::default(),
        ))
    }

    /// Spawn an observer; the first one becomes the active observer.
    pub fn spawn_observer(&mut self, name: &str, id: u32, position: Vec3, velocity: Vec3) -> Entity {
        let entity = self.world.spawn((
            Name::new(name),
            Transform::at(position),
            Velocity(velocity),
            Observer { id },
            FrameMode::default(),
            LocalScale::default(),
        ));
        if self.origin.observer().is_none() {
            self.origin.set_observer(Some(entity));
        }
        entity
    }

    /// Make `entity` the one the origin follows.
    pub fn set_active_observer(&mut self, entity: Entity) {
        self.origin.set_observer(Some(entity));
        self.origin.refresh(&self.world);
    }

    /// Replicate `entity` under `net_id`.
    pub fn assign_net_id(&mut self, entity: Entity, net_id: u64) {
        let _ = self.world.insert_one(entity, NetId(net_id));
    }

    /// Remove a body and its tracked safety status.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if self.world.despawn(entity).is_err() {
            return false;
        }
        self.safety.forget_entity(status_key(entity));
        if self.origin.observer() == Some(entity) {
            self.origin.set_observer(None);
        }
        true
    }

    // ── Tick ───────────────────────────────────────────────────────────

    /// Advance the scene by `delta_seconds` of wall time
    pub fn update(&mut self, delta_seconds: f64) {
        let dt = delta_seconds * self.time_scale;
        if !(dt > 0.0) {
            return;
        }
        self.sim_time += dt;
        self.safety.advance_clock(dt);

        // T0: forces, then motion, in the current frame
        self.origin.refresh(&self.world);
        gravity_system(&mut self.world, &self.safety, &self.origin, dt);
        integration_system(&mut self.world, &self.safety, &self.origin, dt);

        // T1: integrity and origin shifts
        self.last_integrity = integrity_system(&mut self.world, &self.safety, &mut self.origin);
    }

    pub fn set_time_scale(&mut self, scale: f64) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn body_count(&self) -> usize {
        self.world.len() as usize
    }

    pub fn last_integrity(&self) -> IntegrityReport {
        self.last_integrity
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Position in absolute world coordinates, whichever frame it is stored in.
    pub fn absolute_position(&self, entity: Entity) -> Option<Vec3> {
        let transform = *self.world.get::<&Transform>(entity).ok()?;
        let relative = self
            .world
            .get::<&FrameMode>(entity)
            .map_or(true, |f| f.origin_relative);
        Some(if relative {
            self.origin.to_absolute(transform.position)
        } else {
            transform.position
        })
    }

    pub fn status_of(&self, entity: Entity) -> Option<SafetyStatus> {
        self.world
            .contains(entity)
            .then(|| self.safety.entity_status(status_key(entity)))
    }

    // ── Recovery ───────────────────────────────────────────────────────

    /// Bring a body out of world-space fallback into the origin-relative frame.
    pub fn reenable_origin_physics(&mut self, entity: Entity) -> bool {
        let Some(mut snapshot) = BodySnapshot::read(&self.world, entity) else {
            return false;
        };
        if !snapshot.origin_relative {
            snapshot.transform.position = self.origin.to_relative(snapshot.transform.position);
        }
        self.safety.reenable_origin_physics(&mut snapshot);
        snapshot.write_back(&mut self.world);
        true
    }

    // ── Observation ────────────────────────────────────────────────────

    /// Measure `target` from every observer.
    pub fn measure_target(&self, feed: &mut ObserverFeed, target: Entity) -> Option<ObservationSet> {
        feed.observe(&self.world, &self.safety, &self.origin, target)
    }

    /// Measure and validate `target` through the safety system.
    pub fn validate_target(&self, feed: &mut ObserverFeed, target: Entity) -> Option<TargetFix> {
        feed.locate(&self.world, &self.safety, &self.origin, target)
    }

    // ── Replication ────────────────────────────────────────────────────

    /// Server side: correction for a client's view of `entity`, if one is needed.
    pub fn correction_for(
        &mut self,
        entity: Entity,
        client_position: Vec3,
    ) -> Result<Option<PositionCorrection>, NetError> {
        plan_position_correction(
            &self.world,
            &self.safety,
            &mut self.sequencer,
            entity,
            client_position,
        )
    }

    /// Client side: apply a correction from the server.
    pub fn apply_correction(&mut self, correction: &PositionCorrection) -> Result<Vec3, NetError> {
        apply_position_correction(&mut self.world, &mut self.sequencer, correction)
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Save the scene to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        crate::persistence::save_scene(
            writer,
            &self.world,
            self.sim_time,
            self.time_scale,
            self.origin.total_shift(),
            self.origin.observer(),
        )
    }

    /// Replace the scene with one loaded from a reader
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let loaded = crate::persistence::load_scene(reader)?;
        for entity in self.world.iter().map(|e| e.entity()) {
            self.safety.forget_entity(status_key(entity));
        }
        self.world = loaded.world;
        for (entity, frame) in self.world.query::<&FrameMode>().iter() {
            if !frame.origin_relative {
                self.safety
                    .restore_status(status_key(entity), SafetyStatus::WorldSpaceFallback);
            }
        }
        self.sim_time = loaded.sim_time;
        self.time_scale = loaded.time_scale;
        self.origin = FloatingOrigin::new();
        self.origin.restore_shift(loaded.origin_shift);
        self.origin.set_observer(loaded.active_observer);
        self.origin.refresh(&self.world);
        self.sequencer = CorrectionSequencer::new();
        self.last_integrity = IntegrityReport::default();
        self.safety.set_clock(self.sim_time);
        Ok(())
    }
}
