//! Integrity system - repairs corrupt bodies and drives the recovery state machine

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use skyscale_logic::recovery::SafetyStatus;
use skyscale_logic::safety::CelestialSafetySystem;

use crate::components::Transform;
use crate::entity::BodySnapshot;
use crate::origin::FloatingOrigin;

/// What one integrity pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub evaluated: usize,
    pub stable: usize,
    pub degraded: usize,
    pub in_fallback: usize,
    /// Origin shifts applied during this pass.
    pub recenters: u32,
}

/// Evaluate every body with a `Transform`.
///
/// A recenter requested mid-pass is applied before the next body is read, so
/// later bodies are judged in the new frame. A body that drops to world-space
/// fallback has its position rewritten to absolute coordinates.
pub fn integrity_system(
    world: &mut World,
    safety: &CelestialSafetySystem,
    origin: &mut FloatingOrigin,
) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    if !safety.configuration().safety_checks_enabled {
        return report;
    }
    origin.refresh(world);

    let bodies: Vec<Entity> = world
        .query::<&Transform>()
        .iter()
        .map(|(e, _)| e)
        .collect();

    for entity in bodies {
        let Some(mut snapshot) = BodySnapshot::read(world, entity) else {
            continue;
        };
        let was_relative = snapshot.origin_relative;
        let status = safety.evaluate_entity(&mut snapshot, Some(&mut *origin));
        if was_relative && !snapshot.origin_relative {
            snapshot.transform.position = origin.to_absolute(snapshot.transform.position);
        }
        snapshot.write_back(world);

        if origin.apply_pending(world).is_some() {
            report.recenters += 1;
        }

        report.evaluated += 1;
        match status {
            SafetyStatus::Stable => report.stable += 1,
            SafetyStatus::Degraded | SafetyStatus::Recovering => report.degraded += 1,
            SafetyStatus::WorldSpaceFallback => report.in_fallback += 1,
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{FrameMode, Name, Velocity};
    use skyscale_logic::config::SafetyConfiguration;
    use skyscale_logic::vector::{Rotator, Vec3};

    fn safety() -> CelestialSafetySystem {
        CelestialSafetySystem::init(SafetyConfiguration::default()).expect("default config")
    }

    #[test]
    fn corrupt_body_is_repaired() {
        let safety = safety();
        let mut origin = FloatingOrigin::new();
        let mut world = World::new();
        let broken = world.spawn((
            Name::new("broken"),
            Transform {
                position: Vec3::new(f64::NAN, 0.0, 0.0),
                rotation: Rotator::new(0.0, f64::INFINITY, 0.0),
            },
            Velocity(Vec3::new(f64::NAN, 1.0, 1.0)),
        ));

        let report = integrity_system(&mut world, &safety, &mut origin);

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.stable, 1);
        let t = *world.get::<&Transform>(broken).expect("transform");
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Rotator::IDENTITY);
        assert_eq!(world.get::<&Velocity>(broken).expect("velocity").0, Vec3::ZERO);
    }

    #[test]
    fn drifting_observer_recenters_everyone() {
        let safety = safety();
        let mut origin = FloatingOrigin::new();
        let mut world = World::new();
        // 1500 km out, past the emergency distance.
        let drift = Vec3::new(1.5e8, 0.0, 0.0);
        let ship = world.spawn((Name::new("ship"), Transform::at(drift)));
        let escort = world.spawn((
            Name::new("escort"),
            Transform::at(drift + Vec3::new(0.0, 2500.0, 0.0)),
        ));
        origin.set_observer(Some(ship));

        let report = integrity_system(&mut world, &safety, &mut origin);

        assert_eq!(report.recenters, 1);
        assert_eq!(report.stable, 2);
        let pos = |e| world.get::<&Transform>(e).map(|t| t.position).ok();
        assert_eq!(pos(ship), Some(Vec3::ZERO));
        assert_eq!(pos(escort), Some(Vec3::new(0.0, 2500.0, 0.0)));
        assert_eq!(origin.total_shift(), drift);
    }

    #[test]
    fn stranded_body_falls_back_to_absolute() {
        let safety = safety();
        let mut origin = FloatingOrigin::new();
        let mut world = World::new();
        let ship = world.spawn((Name::new("ship"), Transform::default()));
        let stray = world.spawn((Name::new("stray"), Transform::at(Vec3::new(0.0, 0.0, 3e8))));
        origin.set_observer(Some(ship));

        let report = integrity_system(&mut world, &safety, &mut origin);

        assert_eq!(report.in_fallback, 1);
        assert_eq!(report.recenters, 0);
        assert!(!world.get::<&FrameMode>(stray).expect("frame").origin_relative);
        assert_eq!(
            safety.entity_status(crate::entity::status_key(stray)),
            SafetyStatus::WorldSpaceFallback
        );
    }

    #[test]
    fn disabled_checks_skip_the_pass() {
        let safety = CelestialSafetySystem::init(SafetyConfiguration {
            safety_checks_enabled: false,
            ..Default::default()
        })
        .expect("config");
        let mut origin = FloatingOrigin::new();
        let mut world = World::new();
        world.spawn((Transform::at(Vec3::new(f64::NAN, 0.0, 0.0)),));
        assert_eq!(integrity_system(&mut world, &safety, &mut origin).evaluated, 0);
    }
}
