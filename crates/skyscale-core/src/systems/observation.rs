//! Observation feed - builds consensus measurements from observer entities
//!
//! Every measurement in a set is expressed in metres in the frame of the
//! reference observer (the one with the lowest id), so the validator sees
//! small numbers no matter how far the scene has drifted.

use hecs::{Entity, World};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use skyscale_logic::consensus::{ConsensusResult, ObserverMeasurement};
use skyscale_logic::safety::CelestialSafetySystem;
use skyscale_logic::vector::Vec3;

use crate::components::{FrameMode, Observer, Transform};
use crate::origin::FloatingOrigin;

/// One round of measurements plus the frame they were taken in.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    /// Reference observer position, origin-relative engine units.
    pub reference: Vec3,
    pub measurements: Vec<ObserverMeasurement>,
}

impl ObservationSet {
    /// Map a point from the measurement frame back to origin-relative engine units.
    pub fn to_engine_frame(&self, point_meters: Vec3, units_per_meter: f64) -> Vec3 {
        self.reference + point_meters * units_per_meter
    }
}

/// Outcome of validating one target.
#[derive(Debug, Clone)]
pub struct TargetFix {
    pub result: ConsensusResult,
    /// Recovered position in origin-relative engine units, if any.
    pub position: Option<Vec3>,
}

/// Produces observer measurements, optionally with bounded range noise.
#[derive(Debug, Clone)]
pub struct ObserverFeed {
    /// Half-width of the uniform range jitter, metres.
    noise: f64,
    rng: StdRng,
}

impl ObserverFeed {
    /// Noise-free feed.
    pub fn exact() -> Self {
        Self::noisy(0.0, 0)
    }

    /// Feed whose ranges are perturbed by up to `noise` metres, reproducibly.
    pub fn noisy(noise: f64, seed: u64) -> Self {
        Self {
            noise: noise.abs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Measure `target` from every observer. `None` when the target has no
    /// transform or there are no observers.
    pub fn observe(
        &mut self,
        world: &World,
        safety: &CelestialSafetySystem,
        origin: &FloatingOrigin,
        target: Entity,
    ) -> Option<ObservationSet> {
        let config = safety.configuration();
        let target_at = {
            let transform = world.get::<&Transform>(target).ok()?;
            let frame = world.get::<&FrameMode>(target).ok().map(|f| *f);
            origin.relative_position(&transform, frame.as_ref())
        };

        let mut observers: Vec<(u32, Vec3)> = world
            .query::<(&Observer, &Transform, Option<&FrameMode>)>()
            .iter()
            .filter(|(e, _)| *e != target)
            .map(|(_, (o, t, f))| (o.id, origin.relative_position(t, f)))
            .collect();
        observers.sort_by_key(|(id, _)| *id);
        let reference = observers.first()?.1;

        let timestamp = safety.clock();
        let to_meters = |p: Vec3| (p - reference) * (1.0 / config.units_per_meter);
        let target_m = to_meters(target_at);

        let measurements = observers
            .into_iter()
            .map(|(id, at)| {
                let origin_m = to_meters(at);
                let offset = target_m - origin_m;
                let jitter = if self.noise > 0.0 {
                    self.rng.gen_range(-self.noise..=self.noise)
                } else {
                    0.0
                };
                let distance = (offset.length() + jitter).max(0.0);
                ObserverMeasurement {
                    observer_id: id,
                    origin: origin_m,
                    direction: offset.normalize(),
                    distance,
                    scale_factor: safety.safe_scale_factor(distance),
                    timestamp,
                }
            })
            .collect();

        Some(ObservationSet {
            reference,
            measurements,
        })
    }

    /// Measure and validate `target`, mapping the fix back to engine units.
    pub fn locate(
        &mut self,
        world: &World,
        safety: &CelestialSafetySystem,
        origin: &FloatingOrigin,
        target: Entity,
    ) -> Option<TargetFix> {
        let set = self.observe(world, safety, origin, target)?;
        let result = safety.validate_position(&set.measurements);
        let position = result
            .recovered_position
            .map(|p| set.to_engine_frame(p, safety.configuration().units_per_meter));
        Some(TargetFix { result, position })
    }
}
