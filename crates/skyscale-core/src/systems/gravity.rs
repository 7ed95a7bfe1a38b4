//! Gravity system - pulls massive bodies toward gravity wells

use hecs::{Entity, World};
use skyscale_logic::force::{MASS_EPSILON, MIN_G_CAP, STANDARD_GRAVITY};
use skyscale_logic::safety::CelestialSafetySystem;
use skyscale_logic::vector::Vec3;

use crate::components::{FrameMode, GravityWell, Mass, Name, Transform, Velocity};
use crate::origin::FloatingOrigin;

/// Newtonian gravitational constant, SI.
pub const GRAVITATIONAL_CONSTANT: f64 = 6.674_30e-11;

/// Wells closer than this (metres) exert no force; avoids the singularity.
const MIN_SEPARATION: f64 = 1e-3;

/// Accelerate every body with `Mass` and `Velocity` toward every well.
///
/// Forces are computed in SI from origin-relative positions, so bodies in
/// world-space fallback attract and are attracted consistently. Each body's
/// net force passes through the force guard before it touches the velocity.
pub fn gravity_system(
    world: &mut World,
    safety: &CelestialSafetySystem,
    origin: &FloatingOrigin,
    delta_seconds: f64,
) {
    let config = safety.configuration();
    let max_acceleration = config.max_g_force.max(MIN_G_CAP) * STANDARD_GRAVITY;

    let wells: Vec<(Entity, Vec3, f64)> = world
        .query::<(&Transform, &GravityWell, Option<&FrameMode>)>()
        .iter()
        .map(|(e, (t, w, f))| (e, origin.relative_position(t, f), w.mass))
        .collect();
    if wells.is_empty() {
        return;
    }

    let mut updates: Vec<(Entity, Vec3)> = Vec::with_capacity(64);
    for (entity, (transform, mass, frame, velocity, name)) in world
        .query::<(&Transform, &Mass, Option<&FrameMode>, &Velocity, Option<&Name>)>()
        .iter()
    {
        let here = origin.relative_position(transform, frame);
        let mut force = Vec3::ZERO;
        for &(well, at, well_mass) in &wells {
            if well == entity {
                continue;
            }
            let offset = at - here;
            let r = config.to_meters(offset.length());
            if !(r >= MIN_SEPARATION) {
                continue;
            }
            let magnitude = GRAVITATIONAL_CONSTANT * well_mass * mass.0 / (r * r);
            force = force + offset.normalize() * magnitude;
        }

        let force = safety.clamp_gravitational_force(force, mass.0, None);
        let acceleration = if mass.0 > MASS_EPSILON {
            force * (1.0 / mass.0)
        } else {
            Vec3::ZERO
        };
        // The guard floors mass at 1 kg, so lighter bodies need the cap applied
        // to their real acceleration.
        let acceleration = if acceleration.length() > max_acceleration {
            acceleration.normalize() * max_acceleration
        } else {
            acceleration
        };
        let dv = acceleration * (delta_seconds * config.units_per_meter);
        if dv.length_squared() > 0.0 {
            updates.push((entity, velocity.0 + dv));
        }
        if config.verbose_logging {
            if let Some(name) = name {
                log::debug!("{}: gravity {:.3e} N", name.0, force.length());
            }
        }
    }

    for (entity, velocity) in updates {
        if let Ok(mut v) = world.get::<&mut Velocity>(entity) {
            v.0 = velocity;
        }
    }
}
