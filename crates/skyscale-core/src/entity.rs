//! Adapter exposing an ECS body through the `PhysicsEntity` trait.
//!
//! The safety system cannot hold a borrow into the world while the origin
//! manager rewrites it, so bodies are checked out as snapshots, evaluated,
//! and written back.

use hecs::{Entity, World};
use skyscale_logic::recovery::PhysicsEntity;
use skyscale_logic::vector::{Rotator, Vec3};

use crate::components::{FrameMode, Name, Transform, Velocity};

/// Status-tracking key for an entity; unique for the lifetime of the world.
pub fn status_key(entity: Entity) -> u64 {
    entity.to_bits().get()
}

/// Detached copy of one body's physics state.
#[derive(Debug, Clone)]
pub struct BodySnapshot {
    pub entity: Entity,
    pub name: String,
    pub transform: Transform,
    pub velocity: Option<Vec3>,
    pub origin_relative: bool,
}

impl BodySnapshot {
    /// Copy a body out of the world. Requires a `Transform`.
    pub fn read(world: &World, entity: Entity) -> Option<Self> {
        let transform = *world.get::<&Transform>(entity).ok()?;
        let name = world
            .get::<&Name>(entity)
            .map(|n| n.0.clone())
            .unwrap_or_else(|_| format!("entity-{}", entity.id()));
        let velocity = world.get::<&Velocity>(entity).ok().map(|v| v.0);
        let origin_relative = world
            .get::<&FrameMode>(entity)
            .map(|f| f.origin_relative)
            .unwrap_or(true);
        Some(Self {
            entity,
            name,
            transform,
            velocity,
            origin_relative,
        })
    }

    /// Store the snapshot back into the world.
    pub fn write_back(&self, world: &mut World) {
        if let Ok(mut transform) = world.get::<&mut Transform>(self.entity) {
            *transform = self.transform;
        }
        if let Some(v) = self.velocity {
            if let Ok(mut velocity) = world.get::<&mut Velocity>(self.entity) {
                velocity.0 = v;
            }
        }
        let frame = FrameMode {
            origin_relative: self.origin_relative,
        };
        let updated = world
            .get::<&mut FrameMode>(self.entity)
            .map(|mut mode| *mode = frame)
            .is_ok();
        if !updated {
            let _ = world.insert_one(self.entity, frame);
        }
    }
}

impl PhysicsEntity for BodySnapshot {
    fn key(&self) -> u64 {
        status_key(self.entity)
    }

    fn identifier(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Vec3 {
        self.transform.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    fn rotation(&self) -> Rotator {
        self.transform.rotation
    }

    fn set_rotation(&mut self, rotation: Rotator) {
        self.transform.rotation = rotation;
    }

    fn velocity(&self) -> Option<Vec3> {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        if self.velocity.is_some() {
            self.velocity = Some(velocity);
        }
    }

    fn set_origin_relative(&mut self, enabled: bool) {
        self.origin_relative = enabled;
    }
}
