//! End-to-end scenarios through the safety service.
//!
//! Exercises: observer measurements → consensus → statistics, and
//! corrupt/far entities → repair → recenter/fallback.

use skyscale_logic::consensus::{measure_from, observer_confidence};
use skyscale_logic::prelude::*;

// ── Helpers ────────────────────────────────────────────────────────────

fn safety() -> CelestialSafetySystem {
    CelestialSafetySystem::init(SafetyConfiguration::default()).expect("default config is valid")
}

fn measurement(id: u32, origin: Vec3, direction: Vec3, distance: f64) -> ObserverMeasurement {
    ObserverMeasurement {
        observer_id: id,
        origin,
        direction,
        distance,
        scale_factor: 1.0,
        timestamp: 0.0,
    }
}

/// Observers spread over a sphere shell around the target.
fn shell(count: usize, target: Vec3) -> Vec<ObserverMeasurement> {
    (0..count)
        .map(|i| {
            let t = i as f64 + 0.5;
            let phi = (1.0 - 2.0 * t / count as f64).acos();
            let theta = std::f64::consts::PI * (1.0 + 5f64.sqrt()) * t;
            let origin = Vec3::new(
                30_000.0 * phi.sin() * theta.cos(),
                30_000.0 * phi.sin() * theta.sin(),
                30_000.0 * phi.cos(),
            );
            measure_from(i as u32, origin, target, 1.0)
        })
        .collect()
}

struct Rover {
    position: Vec3,
    rotation: Rotator,
    velocity: Vec3,
    origin_relative: bool,
}

impl PhysicsEntity for Rover {
    fn key(&self) -> u64 {
        7
    }
    fn identifier(&self) -> &str {
        "rover"
    }
    fn position(&self) -> Vec3 {
        self.position
    }
    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
    fn rotation(&self) -> Rotator {
        self.rotation
    }
    fn set_rotation(&mut self, rotation: Rotator) {
        self.rotation = rotation;
    }
    fn velocity(&self) -> Option<Vec3> {
        Some(self.velocity)
    }
    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }
    fn set_origin_relative(&mut self, enabled: bool) {
        self.origin_relative = enabled;
    }
}

struct Origin {
    observer: Vec3,
    recenters: u32,
}

impl OriginManager for Origin {
    fn recenter_on_observer(&mut self) {
        self.recenters += 1;
    }
    fn observer_position(&self) -> Vec3 {
        self.observer
    }
}

// ── Consensus scenarios ────────────────────────────────────────────────

#[test]
fn two_observers_agree_on_midpoint() {
    let safety = safety();
    let a = measurement(0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 5000.0);
    let b = measurement(1, Vec3::new(10_000.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 5000.0);

    let result = safety.validate_position(&[a, b]);
    assert!(result.valid);
    let tolerance = safety.validator().tolerance_for(5000.0);
    assert!(result.geometric_error <= tolerance);
    let recovered = result.recovered_position.expect("recovered position");
    assert!(recovered.distance(&Vec3::new(5000.0, 0.0, 0.0)) <= tolerance);
    assert_eq!(safety.statistics().consensus_failures, 0);
}

#[test]
fn ten_times_too_far_is_rejected() {
    let safety = safety();
    let a = measurement(0, Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 5000.0);
    let b = measurement(1, Vec3::new(10_000.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 50_000.0);

    let result = safety.validate_position(&[a, b]);
    assert!(!result.valid);
    assert_eq!(result.confidence, 0.0);
    assert!(result.geometric_error > safety.validator().tolerance_for(27_500.0));
    assert_eq!(result.rejection, Some(ConsensusRejection::Inconsistent));
    assert_eq!(safety.statistics().consensus_failures, 1);
}

#[test]
fn three_exact_observers_validate() {
    let target = Vec3::new(1500.0, -2500.0, 800.0);
    let result = safety().validate_position(&shell(3, target));
    assert!(result.valid);
    assert!(result.geometric_error < 1e-6);
}

#[test]
fn more_witnesses_more_confidence() {
    let target = Vec3::new(100.0, 200.0, 300.0);
    let safety = safety();
    let three = safety.validate_position(&shell(3, target));
    let eight = safety.validate_position(&shell(8, target));
    assert!(three.valid && eight.valid);
    assert!(eight.confidence > three.confidence);

    for n in 2..20 {
        assert!(observer_confidence(n + 1) > observer_confidence(n));
    }
}

#[test]
fn solved_position_matches_truth() {
    let target = Vec3::new(-4200.0, 1300.0, 950.0);
    let result = safety().validate_position(&shell(7, target));
    assert!(result.valid);
    assert!(result.recovered_position.expect("position").distance(&target) < 1e-3);
}

#[test]
fn single_observer_never_validates() {
    let m = measure_from(0, Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0), 0.0);
    let result = safety().validate_position(&[m]);
    assert!(!result.valid);
    assert_eq!(result.observer_count, 1);
}

// ── Recovery scenarios ─────────────────────────────────────────────────

#[test]
fn corrupt_rover_is_repaired_once() {
    let safety = safety();
    let mut rover = Rover {
        position: Vec3::new(f64::NAN, 0.0, 0.0),
        rotation: Rotator::new(f64::NAN, 0.0, 0.0),
        velocity: Vec3::new(f64::INFINITY, 0.0, 0.0),
        origin_relative: true,
    };

    assert!(safety.validate_and_repair_physics_state(&mut rover));
    let after_first = safety.statistics().total_events;
    assert_eq!(after_first, 3);
    assert!(!safety.validate_and_repair_physics_state(&mut rover));
    assert_eq!(safety.statistics().total_events, after_first);
}

#[test]
fn drifting_rover_recenters_then_stays_stable() {
    let safety = safety();
    // 2000 km out, in centimetres; the observer travels with it.
    let far = Vec3::new(2.0e8, 0.0, 0.0);
    let mut rover = Rover {
        position: far,
        rotation: Rotator::IDENTITY,
        velocity: Vec3::ZERO,
        origin_relative: true,
    };
    let mut origin = Origin {
        observer: far,
        recenters: 0,
    };

    let status = safety.evaluate_entity(&mut rover, Some(&mut origin));
    assert_eq!(status, SafetyStatus::Stable);
    assert_eq!(origin.recenters, 1);
    assert_eq!(safety.statistics().recovery_operations, 1);

    // The host applied the recenter.
    rover.position = Vec3::ZERO;
    assert_eq!(safety.evaluate_entity(&mut rover, None), SafetyStatus::Stable);
}

#[test]
fn stranded_rover_falls_back_to_world_space() {
    let safety = safety();
    let mut rover = Rover {
        position: Vec3::new(0.0, 3.0e8, 0.0),
        rotation: Rotator::IDENTITY,
        velocity: Vec3::ZERO,
        origin_relative: true,
    };
    let mut origin = Origin {
        observer: Vec3::ZERO,
        recenters: 0,
    };

    let status = safety.evaluate_entity(&mut rover, Some(&mut origin));
    assert_eq!(status, SafetyStatus::WorldSpaceFallback);
    assert!(!rover.origin_relative);
    assert_eq!(origin.recenters, 0);
    assert!(!safety.events_with_severity(SafetySeverity::Critical).is_empty());
}
