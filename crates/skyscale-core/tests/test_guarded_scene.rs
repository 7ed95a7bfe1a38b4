//! Integration tests for a guarded scene running through `SafetyEngine`.
//!
//! Exercises: spawn → gravity → velocity guard → integration → integrity
//! → origin shift, plus observer consensus and server/client corrections
//! over the wire.

use skyscale_core::net::{decode_correction, encode_correction};
use skyscale_core::prelude::*;
use skyscale_core::settings::parse_configuration;

// ── Helpers ────────────────────────────────────────────────────────────

fn engine() -> SafetyEngine {
    SafetyEngine::new(SafetyConfiguration::default()).expect("default config")
}

/// Four observers spread 2 km apart around the ship, on different heights.
fn observer_ring(engine: &mut SafetyEngine, center: Vec3) {
    let offsets = [
        Vec3::new(200_000.0, 0.0, 0.0),
        Vec3::new(0.0, 200_000.0, 30_000.0),
        Vec3::new(-200_000.0, 0.0, -40_000.0),
        Vec3::new(0.0, -200_000.0, 90_000.0),
    ];
    for (i, offset) in offsets.iter().enumerate() {
        engine.spawn_observer(&format!("station-{}", i + 1), i as u32 + 1, center + *offset, Vec3::ZERO);
    }
}

// ── Floating origin ────────────────────────────────────────────────────

#[test]
fn long_cruise_recenters_and_keeps_formation() {
    let mut engine = engine();
    // 40 km/s: exactly 1000 km (the emergency distance) after 25 s.
    let cruise = Vec3::new(4e6, 0.0, 0.0);
    let ship = engine.spawn_observer("ship", 0, Vec3::ZERO, cruise);
    // Trailing 50 m behind, so the ship is always the farthest body out.
    let escort = engine.spawn_body("escort", Vec3::new(-5000.0, 0.0, 0.0), cruise, 2.0e4);

    // Past the emergency distance on tick 26, then two more ticks of cruise.
    for _ in 0..28 {
        engine.update(1.0);
    }

    assert_eq!(engine.origin.recenter_count(), 1);
    let ship_at = engine.absolute_position(ship).expect("ship");
    let escort_at = engine.absolute_position(escort).expect("escort");
    assert!((ship_at.x - 1.12e8).abs() < 1.0, "ship at {:?}", ship_at);
    assert!((escort_at - ship_at).distance(&Vec3::new(-5000.0, 0.0, 0.0)) < 1e-3);

    // Stored coordinates stay small after the shift.
    let stored = engine.world.get::<&Transform>(ship).expect("transform").position;
    assert!(engine.safety().is_position_precision_safe(&stored));
    assert_eq!(engine.status_of(escort), Some(SafetyStatus::Stable));
    assert!(engine.safety().statistics().recovery_operations >= 1);
}

#[test]
fn left_behind_body_falls_back_and_is_not_shifted() {
    let mut engine = engine();
    engine.spawn_observer("ship", 0, Vec3::ZERO, Vec3::new(4e6, 0.0, 0.0));
    let buoy = engine.spawn_body("buoy", Vec3::new(-1.2e8, 0.0, 0.0), Vec3::ZERO, 50.0);

    for _ in 0..30 {
        engine.update(1.0);
    }

    assert_eq!(engine.status_of(buoy), Some(SafetyStatus::WorldSpaceFallback));
    // Absolute position unchanged by any recenter.
    let at = engine.absolute_position(buoy).expect("buoy");
    assert!(at.distance(&Vec3::new(-1.2e8, 0.0, 0.0)) < 1e-6);
    let critical = engine.safety().events_with_severity(SafetySeverity::Critical);
    assert!(critical.iter().any(|e| e.subject.as_deref() == Some("buoy")));
}

#[test]
fn corruption_mid_run_is_repaired() {
    let mut engine = engine();
    engine.spawn_observer("ship", 0, Vec3::ZERO, Vec3::ZERO);
    let probe = engine.spawn_body("probe", Vec3::new(100.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0), 5.0);
    engine.update(0.5);

    engine
        .world
        .get::<&mut Velocity>(probe)
        .expect("velocity")
        .0 = Vec3::new(f64::NAN, 0.0, 0.0);
    engine.update(0.5);
    engine.update(0.5);

    let stored = *engine.world.get::<&Transform>(probe).expect("transform");
    assert!(stored.position.is_finite());
    assert_eq!(engine.status_of(probe), Some(SafetyStatus::Stable));
    assert!(!engine.safety().events_with_severity(SafetySeverity::Error).is_empty());
}

// ── Gravity ────────────────────────────────────────────────────────────

#[test]
fn falling_probe_stays_under_the_g_cap() {
    let config = parse_configuration(r#"{ "max_g_force": 2.0 }"#).expect("config");
    let mut engine = SafetyEngine::new(config).expect("valid");
    engine.spawn_observer("ship", 0, Vec3::ZERO, Vec3::ZERO);
    // A neutron-star mass 10 km below the probe.
    engine.spawn_gravity_well("pulsar", Vec3::new(0.0, 0.0, -1e6), 2.8e30);
    let probe = engine.spawn_body("probe", Vec3::ZERO, Vec3::ZERO, 1000.0);

    engine.update(1.0);

    let v = engine.world.get::<&Velocity>(probe).expect("velocity").0;
    let achieved_g = v.length() / 100.0 / skyscale_logic::force::STANDARD_GRAVITY;
    assert!(achieved_g <= 2.0 + 1e-9, "achieved {} g", achieved_g);
    assert!(v.z < 0.0);
}

// ── Consensus ──────────────────────────────────────────────────────────

#[test]
fn noisy_observers_agree_on_target() {
    let mut engine = engine();
    observer_ring(&mut engine, Vec3::ZERO);
    let target = engine.spawn_body("target", Vec3::new(40_000.0, 25_000.0, 10_000.0), Vec3::ZERO, 10.0);

    let mut feed = ObserverFeed::noisy(0.05, 11);
    let fix = engine.validate_target(&mut feed, target).expect("observers present");

    assert!(fix.result.valid, "{:?}", fix.result);
    assert_eq!(fix.result.observer_count, 4);
    assert!(fix.result.confidence > 0.8);
    let position = fix.position.expect("recovered");
    // Within half a metre of truth.
    assert!(position.distance(&Vec3::new(40_000.0, 25_000.0, 10_000.0)) < 50.0);
    assert_eq!(engine.safety().statistics().consensus_failures, 0);
}

#[test]
fn consensus_survives_a_recenter() {
    let mut engine = engine();
    let far = Vec3::new(1.5e8, 0.0, 0.0);
    observer_ring(&mut engine, far);
    let target = engine.spawn_body("target", far + Vec3::new(10_000.0, 0.0, 0.0), Vec3::ZERO, 1.0);

    let mut feed = ObserverFeed::exact();
    let before = engine.measure_target(&mut feed, target).expect("set");
    engine.update(0.1);
    assert!(engine.origin.recenter_count() >= 1);
    let after = engine.measure_target(&mut feed, target).expect("set");

    for (a, b) in before.measurements.iter().zip(&after.measurements) {
        assert!((a.distance - b.distance).abs() < 1e-6);
    }
    assert!(engine.validate_target(&mut feed, target).expect("fix").result.valid);
}

#[test]
fn lying_observer_breaks_consensus() {
    let mut engine = engine();
    observer_ring(&mut engine, Vec3::ZERO);
    let target = engine.spawn_body("target", Vec3::new(40_000.0, 25_000.0, 10_000.0), Vec3::ZERO, 10.0);

    let mut set = engine
        .measure_target(&mut ObserverFeed::exact(), target)
        .expect("set");
    set.measurements[2].distance *= 10.0;

    let result = engine.safety().validate_position(&set.measurements);
    assert!(!result.valid);
    assert_eq!(engine.safety().statistics().consensus_failures, 1);
}

// ── Replication ────────────────────────────────────────────────────────

#[test]
fn server_and_client_converge_over_the_wire() {
    let mut server = engine();
    let mut client = engine();

    let rover_s = server.spawn_body("rover", Vec3::new(1000.0, 0.0, 0.0), Vec3::ZERO, 500.0);
    server.assign_net_id(rover_s, 77);
    let rover_c = client.spawn_body("rover", Vec3::new(1000.0, 3000.0, 0.0), Vec3::ZERO, 500.0);
    client.assign_net_id(rover_c, 77);

    // 30 m apart: a partial blend, not a snap.
    let client_view = client.world.get::<&Transform>(rover_c).expect("transform").position;
    let correction = server
        .correction_for(rover_s, client_view)
        .expect("known")
        .expect("needed");
    assert!(correction.strength > 0.0 && correction.strength < 1.0);

    let bytes = encode_correction(&correction).expect("encode");
    let received = decode_correction(&bytes).expect("decode");
    let moved = client.apply_correction(&received).expect("apply");
    assert!(moved.y < 3000.0 && moved.y > 0.0);

    // Repeated rounds close the gap.
    for _ in 0..20 {
        let view = client.world.get::<&Transform>(rover_c).expect("transform").position;
        if let Some(c) = server.correction_for(rover_s, view).expect("known") {
            client
                .apply_correction(&decode_correction(&encode_correction(&c).expect("encode")).expect("decode"))
                .expect("fresh sequence");
        }
    }
    // The blend weakens as the gap closes, so the gap shrinks but never snaps.
    let view = client.world.get::<&Transform>(rover_c).expect("transform").position;
    let gap_meters = view.distance(&Vec3::new(1000.0, 0.0, 0.0)) / 100.0;
    assert!(gap_meters < 10.0 && gap_meters > 1.0, "gap {} m", gap_meters);
    assert_eq!(server.safety().statistics().desync_events, 21);
}
