//! Integration system - velocity guard and position update

use hecs::{Entity, World};
use skyscale_logic::recovery::OriginManager;
use skyscale_logic::safety::CelestialSafetySystem;
use skyscale_logic::vector::Vec3;

use crate::components::{FrameMode, LocalScale, Name, Transform, Velocity};
use crate::origin::FloatingOrigin;

/// Clamp each velocity to the ceiling for its local scale, then move the body.
///
/// A body's local scale is the safe scale factor for its distance from the
/// active observer. Velocities are judged relative to the observer's own
/// velocity (the observer itself is judged in absolute terms), checked in
/// m/s and stored back in engine units per second.
pub fn integration_system(
    world: &mut World,
    safety: &CelestialSafetySystem,
    origin: &FloatingOrigin,
    delta_seconds: f64,
) {
    let config = safety.configuration();
    let observer_at = origin.observer_position();
    let observer = origin.observer();
    let observer_velocity = observer
        .and_then(|e| world.get::<&Velocity>(e).ok().map(|v| v.0))
        .filter(|v| v.is_finite())
        .unwrap_or(Vec3::ZERO);

    let mut updates: Vec<(Entity, Vec3, Vec3, f64)> = Vec::with_capacity(64);
    for (entity, (transform, velocity, frame, name)) in world
        .query::<(&Transform, &Velocity, Option<&FrameMode>, Option<&Name>)>()
        .iter()
    {
        let here = origin.relative_position(transform, frame);
        let distance = config.to_meters(here.distance(&observer_at));
        let scale = safety.safe_scale_factor(distance);

        let frame_velocity = if observer == Some(entity) {
            Vec3::ZERO
        } else {
            observer_velocity
        };
        let meters_per_second = (velocity.0 - frame_velocity) * (1.0 / config.units_per_meter);
        let subject = name.map(|n| n.0.as_str());
        let clamped = safety.clamp_velocity(meters_per_second, scale, subject) * config.units_per_meter
            + frame_velocity;

        let position = transform.position + clamped * delta_seconds;
        updates.push((entity, position, clamped, scale));
    }

    for (entity, position, velocity, scale) in updates {
        if let Ok(mut t) = world.get::<&mut Transform>(entity) {
            t.position = position;
        }
        if let Ok(mut v) = world.get::<&mut Velocity>(entity) {
            v.0 = velocity;
        }
        if let Ok(mut s) = world.get::<&mut LocalScale>(entity) {
            s.0 = scale;
        }
    }
}
