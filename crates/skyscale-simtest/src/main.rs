//! SkyScale Headless Safety Harness
//!
//! Exercises every guard, monitor and validator against the active
//! configuration, then runs a short guarded scene end to end.
//! Runs entirely in-process; no rendering, no networking.
//!
//! Usage:
//!   cargo run -p skyscale-simtest
//!   cargo run -p skyscale-simtest -- --verbose
//!   cargo run -p skyscale-simtest -- --config path/to/safety_config.json
//!
//! `RUST_LOG` controls how much of the safety event stream is printed.

use std::fs::File;

use skyscale_core::entity::BodySnapshot;
use skyscale_core::net::{decode_correction, encode_correction, CorrectionSequencer, NetError};
use skyscale_core::prelude::*;
use skyscale_core::settings::{
    configuration_to_json, load_configuration, parse_configuration, SettingsError,
};
use skyscale_logic::consensus::{measure_from, observer_confidence};
use skyscale_logic::desync::plan_correction;
use skyscale_logic::events::SafetyEventLog;
use skyscale_logic::force::STANDARD_GRAVITY;
use skyscale_logic::scale::{clamp_scale_factor, ClampOutcome};

// ── Shipped defaults (same JSON the tests pin) ──────────────────────────
const DEFAULT_CONFIG_JSON: &str = include_str!("../../../data/safety_config.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));

    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1));

    println!("=== SkyScale Safety Harness ===\n");

    let config = match config_path {
        Some(path) => File::open(path)
            .map_err(SettingsError::from)
            .and_then(load_configuration),
        None => parse_configuration(DEFAULT_CONFIG_JSON),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cannot load configuration: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(path) = config_path {
        println!("Configuration: {}", path);
    }

    let mut results = Vec::new();

    // 1. Configuration
    results.extend(validate_configuration(&config, verbose));

    // 2. Scale guard
    results.extend(validate_scale_guard(&config, verbose));

    // 3. Force guard
    results.extend(validate_force_guard(&config, verbose));

    // 4. Precision monitor
    results.extend(validate_precision_monitor(&config, verbose));

    // 5. Network desync monitor
    results.extend(validate_desync_monitor(&config, verbose));

    // 6. Event log
    results.extend(validate_event_log(&config, verbose));

    // 7. Recovery coordinator
    results.extend(validate_recovery(&config, verbose));

    // 8. Observer consensus
    results.extend(validate_consensus(&config, verbose));

    // 9. Guarded scene run
    results.extend(validate_engine_run(&config, verbose));

    // 10. Correction wire format
    results.extend(validate_network(&config, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn safety_for(config: &SafetyConfiguration) -> CelestialSafetySystem {
    match CelestialSafetySystem::init(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration rejected: {}", e);
            std::process::exit(2);
        }
    }
}

fn engine_for(config: &SafetyConfiguration) -> SafetyEngine {
    SafetyEngine::with_safety(std::sync::Arc::new(safety_for(config)))
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_configuration(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "config_valid".into(),
        passed: config.validate().is_ok(),
        detail: format!(
            "scale [{}, {}], {} g, log {}",
            config.min_scale_factor,
            config.max_scale_factor,
            config.max_g_force,
            config.max_event_log_size
        ),
    });

    let round_trip = configuration_to_json(config)
        .ok()
        .and_then(|json| parse_configuration(&json).ok());
    results.push(TestResult {
        name: "config_json_round_trip".into(),
        passed: round_trip.as_ref() == Some(config),
        detail: "serialize → parse yields the same configuration".into(),
    });

    let inverted = parse_configuration(r#"{ "min_scale_factor": 10.0, "max_scale_factor": 1.0 }"#);
    results.push(TestResult {
        name: "config_rejects_inverted_range".into(),
        passed: inverted.is_err(),
        detail: match inverted {
            Err(e) => e.to_string(),
            Ok(_) => "inverted range accepted".into(),
        },
    });

    let partial = parse_configuration(r#"{ "verbose_logging": true }"#);
    results.push(TestResult {
        name: "config_partial_fills_defaults".into(),
        passed: partial
            .as_ref()
            .map(|c| c.verbose_logging && c.max_g_force == SafetyConfiguration::default().max_g_force)
            .unwrap_or(false),
        detail: "missing fields take defaults".into(),
    });

    if verbose {
        println!("  units per metre: {}", config.units_per_meter);
    }
    results
}

// ── 2. Scale Guard ──────────────────────────────────────────────────────

fn validate_scale_guard(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Scale Guard ---");
    let mut results = Vec::new();
    let safety = safety_for(config);

    let inputs = [
        0.0,
        -3.0,
        1e-12,
        config.min_scale_factor / 2.0,
        1.0,
        config.max_scale_factor * 2.0,
        f64::NAN,
        f64::INFINITY,
        f64::NEG_INFINITY,
    ];
    let all_in_range = inputs
        .iter()
        .all(|f| safety.is_valid_scale_factor(safety.clamp_scale_factor(*f)));
    results.push(TestResult {
        name: "scale_clamp_always_valid".into(),
        passed: all_in_range,
        detail: format!("{} hostile inputs clamped into range", inputs.len()),
    });

    let nan = clamp_scale_factor(f64::NAN, config);
    let big = clamp_scale_factor(config.max_scale_factor * 2.0, config);
    results.push(TestResult {
        name: "scale_clamp_outcomes".into(),
        passed: nan.outcome == ClampOutcome::Replaced
            && nan.value == config.min_scale_factor
            && big.outcome == ClampOutcome::Clamped
            && big.value == config.max_scale_factor,
        detail: "NaN → min (replaced), oversize → max (clamped)".into(),
    });

    let warnings = safety.events_with_severity(SafetySeverity::Warning).len();
    results.push(TestResult {
        name: "scale_replacements_logged".into(),
        passed: warnings >= 4,
        detail: format!("{} warnings for degenerate factors", warnings),
    });

    let at_reference = safety.safe_scale_factor(config.reference_distance);
    let quadrupled = safety.safe_scale_factor(config.reference_distance * 4.0);
    results.push(TestResult {
        name: "safe_scale_law".into(),
        passed: (at_reference - 1.0).abs() < 1e-12 && (quadrupled - 0.5).abs() < 1e-12,
        detail: format!("d_ref → {:.3}, 4·d_ref → {:.3}", at_reference, quadrupled),
    });

    let before = safety.event_count();
    let degenerate = [0.0, -1.0, f64::NAN, f64::INFINITY]
        .iter()
        .all(|d| safety.safe_scale_factor(*d) == 1.0);
    results.push(TestResult {
        name: "safe_scale_degenerate_distance".into(),
        passed: degenerate && safety.event_count() == before,
        detail: "non-positive/non-finite distance → 1.0, no events".into(),
    });

    let distances = [1.0, 1e3, 1e5, 1e6, 1e8, 1e11];
    let monotonic = distances
        .windows(2)
        .all(|w| safety.safe_scale_factor(w[0]) >= safety.safe_scale_factor(w[1]));
    results.push(TestResult {
        name: "safe_scale_monotonic".into(),
        passed: monotonic,
        detail: "farther never yields a larger factor".into(),
    });

    if verbose {
        for d in distances {
            println!("  d = {:>8.0e} m → scale {:.4}", d, safety.safe_scale_factor(d));
        }
    }
    results
}

// ── 3. Force Guard ──────────────────────────────────────────────────────

fn validate_force_guard(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Force Guard ---");
    let mut results = Vec::new();
    let safety = safety_for(config);

    let huge = Vec3::new(0.0, 0.0, -1e12);
    let clamped = safety.clamp_gravitational_force(huge, 1000.0, None);
    let g = clamped.length() / 1000.0 / STANDARD_GRAVITY;
    results.push(TestResult {
        name: "force_capped_at_max_g".into(),
        passed: g <= config.max_g_force * (1.0 + 1e-12) && clamped.z < 0.0,
        detail: format!("1e12 N on 1 t → {:.2} g, direction kept", g),
    });

    let tiny = safety.clamp_gravitational_force(Vec3::new(0.0, 0.0, -5.0), 1e-12, None);
    results.push(TestResult {
        name: "force_massless_passthrough".into(),
        passed: tiny == Vec3::new(0.0, 0.0, -5.0),
        detail: "near-zero mass leaves force untouched".into(),
    });

    let strict = safety.clamp_gravitational_force(huge, 1000.0, Some(0.0));
    let strict_g = strict.length() / 1000.0 / STANDARD_GRAVITY;
    results.push(TestResult {
        name: "force_override_floor".into(),
        passed: (strict_g - 0.1).abs() < 1e-9,
        detail: format!("override 0 g floored to {:.2} g", strict_g),
    });

    let discarded = safety.clamp_gravitational_force(Vec3::new(f64::NAN, 0.0, 0.0), 10.0, None);
    results.push(TestResult {
        name: "force_non_finite_discarded".into(),
        passed: discarded == Vec3::ZERO
            && !safety.events_with_severity(SafetySeverity::Error).is_empty(),
        detail: "NaN force → zero + Error event".into(),
    });

    let within = safety.is_force_within_safe_limits(&Vec3::new(0.0, 9806.65, 0.0), 1000.0);
    let beyond = safety.is_force_within_safe_limits(&huge, 1000.0);
    results.push(TestResult {
        name: "force_limit_predicate".into(),
        passed: within && !beyond,
        detail: "1 g within, 1e8 g beyond".into(),
    });

    let ceilings: Vec<f64> = [0.01, 0.1, 1.0, 10.0, 1e4]
        .iter()
        .map(|s| safety.max_safe_velocity(*s))
        .collect();
    let bounded = ceilings
        .iter()
        .all(|v| *v >= 100.0 && *v <= config.max_safe_velocity_ms.max(100.0));
    results.push(TestResult {
        name: "velocity_ceiling_bounds".into(),
        passed: bounded && ceilings.windows(2).all(|w| w[0] >= w[1]),
        detail: format!("ceilings {:?} m/s", ceilings),
    });

    let fast = safety.clamp_velocity(Vec3::new(1e9, 0.0, 0.0), 1.0, Some("runaway"));
    results.push(TestResult {
        name: "velocity_clamped".into(),
        passed: (fast.length() - safety.max_safe_velocity(1.0)).abs() < 1e-6,
        detail: format!("1e9 m/s → {:.0} m/s", fast.length()),
    });

    if verbose {
        println!("  {} events logged", safety.event_count());
    }
    results
}

// ── 4. Precision Monitor ────────────────────────────────────────────────

fn validate_precision_monitor(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Precision Monitor ---");
    let mut results = Vec::new();
    let safety = safety_for(config);
    let units = |meters: f64| Vec3::new(meters * config.units_per_meter, 0.0, 0.0);

    let at = units(config.precision_warning_distance);
    results.push(TestResult {
        name: "precision_boundary".into(),
        passed: !safety.detect_precision_error(&at) && !safety.is_position_precision_safe(&at),
        detail: "exactly at the warning distance: no error, not safe".into(),
    });

    results.push(TestResult {
        name: "precision_far_and_near".into(),
        passed: safety.detect_precision_error(&units(config.precision_warning_distance * 2.0))
            && safety.is_position_precision_safe(&units(1.0)),
        detail: "2× warning distance flagged, 1 m safe".into(),
    });

    results.push(TestResult {
        name: "precision_non_finite".into(),
        passed: safety.detect_precision_error(&Vec3::new(f64::NAN, 0.0, 0.0))
            && !safety.is_position_precision_safe(&Vec3::new(0.0, f64::INFINITY, 0.0)),
        detail: "non-finite positions are always errors".into(),
    });

    let big = 123_456_789.123_f64;
    let err = safety.calculate_floating_point_error(big, big as f32);
    results.push(TestResult {
        name: "precision_fp_error".into(),
        passed: safety.calculate_floating_point_error(0.0, 0.0) == 0.0 && err > 0.0 && err < 1e-5,
        detail: format!("f32 copy of {:.3} off by {:.2e} %", big, err),
    });

    let thresholds = [0.0, 1e3, 1e5, 1e7, 1e9].map(|d| safety.precision_threshold(d));
    results.push(TestResult {
        name: "precision_threshold_curve".into(),
        passed: (thresholds[0] - 0.01).abs() < 1e-12
            && (thresholds[2] - 0.1).abs() < 1e-12
            && (thresholds[4] - 1.0).abs() < 1e-12
            && thresholds.windows(2).all(|w| w[0] <= w[1]),
        detail: format!("{:?} m", thresholds),
    });

    if verbose {
        println!("  emergency recenter beyond {} m", config.emergency_recenter_distance);
    }
    results
}

// ── 5. Network Desync Monitor ───────────────────────────────────────────

fn validate_desync_monitor(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Network Desync Monitor ---");
    let mut results = Vec::new();
    let safety = safety_for(config);
    let units = |meters: f64| Vec3::new(meters * config.units_per_meter, 0.0, 0.0);

    let ladder = [
        (config.network_desync_tolerance * 0.5, SafetySeverity::Info),
        (
            (config.network_desync_tolerance + config.desync_error_distance) / 2.0,
            SafetySeverity::Warning,
        ),
        (
            (config.desync_error_distance + config.desync_critical_distance) / 2.0,
            SafetySeverity::Error,
        ),
        (config.desync_critical_distance * 2.0, SafetySeverity::Critical),
    ];
    let graded = ladder.iter().all(|(meters, expected)| {
        safety.log_network_desync("probe", &Vec3::ZERO, &units(*meters)).severity == *expected
    });
    results.push(TestResult {
        name: "desync_severity_ladder".into(),
        passed: graded,
        detail: "Info → Warning → Error → Critical by distance".into(),
    });

    let stats = safety.statistics();
    results.push(TestResult {
        name: "desync_always_counted".into(),
        passed: stats.desync_events == ladder.len() as u64 && stats.critical_events == 1,
        detail: format!("{} desync events, {} critical", stats.desync_events, stats.critical_events),
    });

    let corrupt = safety.log_network_desync("probe", &Vec3::new(f64::NAN, 0.0, 0.0), &Vec3::ZERO);
    results.push(TestResult {
        name: "desync_corrupt_is_critical".into(),
        passed: corrupt.severity == SafetySeverity::Critical && corrupt.correction_strength == 1.0,
        detail: "NaN client position → Critical, full snap".into(),
    });

    let samples = [0.0, 0.5, 1.0, 2.0, 10.0, 50.0, 99.0, 100.0, 1e6];
    let strengths: Vec<f64> = samples
        .iter()
        .map(|d| safety.network_correction_strength(*d))
        .collect();
    results.push(TestResult {
        name: "desync_strength_monotonic".into(),
        passed: strengths.windows(2).all(|w| w[0] <= w[1])
            && strengths.iter().all(|s| (0.0..=1.0).contains(s))
            && safety.network_correction_strength(config.network_desync_tolerance) == 0.0
            && safety.network_correction_strength(config.desync_critical_distance) == 1.0,
        detail: format!("{:?}", strengths),
    });

    results.push(TestResult {
        name: "desync_acceptable_at_tolerance".into(),
        passed: safety.is_desync_acceptable(config.network_desync_tolerance)
            && !safety.is_desync_acceptable(config.network_desync_tolerance * 1.01),
        detail: "tolerance is inclusive".into(),
    });

    if verbose {
        println!("  strengths {:?}", strengths);
    }
    results
}

// ── 6. Event Log ────────────────────────────────────────────────────────

fn validate_event_log(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Event Log ---");
    let mut results = Vec::new();

    let mut log = SafetyEventLog::new(3);
    for i in 0..5 {
        log.push(SafetyEvent {
            severity: SafetySeverity::Info,
            message: format!("event {}", i),
            subject: None,
            timestamp: i as f64,
        });
    }
    let recent: Vec<String> = log.recent(10).into_iter().map(|e| e.message).collect();
    results.push(TestResult {
        name: "event_log_fifo_eviction".into(),
        passed: log.len() == 3 && recent == ["event 2", "event 3", "event 4"],
        detail: format!("retained {:?}", recent),
    });

    let small = SafetyConfiguration {
        max_event_log_size: 4,
        ..config.clone()
    };
    let safety = safety_for(&small);
    safety.set_clock(10.0);
    for i in 0..10 {
        safety.log_safety_event(&format!("tick {}", i), SafetySeverity::Info, None);
        safety.advance_clock(1.0);
    }
    safety.log_safety_event("hull breach", SafetySeverity::Fatal, Some("ship"));
    let stats = safety.statistics();
    results.push(TestResult {
        name: "event_log_bounded_stats_unbounded".into(),
        passed: safety.event_count() == 4 && stats.total_events == 11 && stats.critical_events == 1,
        detail: format!("{} retained of {} logged", safety.event_count(), stats.total_events),
    });

    results.push(TestResult {
        name: "event_log_timestamps".into(),
        passed: stats.last_event_time == Some(20.0),
        detail: format!("last event at t = {:?}", stats.last_event_time),
    });

    let fatal = safety.events_with_severity(SafetySeverity::Critical);
    results.push(TestResult {
        name: "event_log_severity_query".into(),
        passed: fatal.len() == 1 && fatal[0].subject.as_deref() == Some("ship"),
        detail: "Fatal is at or above Critical".into(),
    });

    safety.reinitialize();
    results.push(TestResult {
        name: "event_log_reinitialize".into(),
        passed: safety.event_count() == 0
            && safety.statistics() == SafetyStatistics::default()
            && safety.is_initialized(),
        detail: "log, counters and clock reset".into(),
    });

    if verbose {
        println!("  capacity {}", log.capacity());
    }
    results
}

// ── 7. Recovery Coordinator ─────────────────────────────────────────────

fn validate_recovery(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Recovery Coordinator ---");
    let mut results = Vec::new();
    let mut engine = engine_for(config);
    let far = (config.emergency_recenter_distance * 3.0) * config.units_per_meter;

    engine.spawn_observer("ship", 0, Vec3::ZERO, Vec3::ZERO);
    let broken = engine.spawn_body("broken", Vec3::new(f64::NAN, 0.0, 0.0), Vec3::ZERO, 10.0);
    let stray = engine.spawn_body("stray", Vec3::new(0.0, far, 0.0), Vec3::ZERO, 10.0);
    let probe = engine.spawn_body("probe", Vec3::new(300.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0), 10.0);

    engine.update(0.1);

    let repaired = engine
        .world
        .get::<&Transform>(broken)
        .map(|t| t.position.is_finite())
        .unwrap_or(false);
    results.push(TestResult {
        name: "recovery_repairs_non_finite".into(),
        passed: repaired && engine.status_of(broken) == Some(SafetyStatus::Stable),
        detail: "NaN position repaired, entity stable".into(),
    });

    results.push(TestResult {
        name: "recovery_world_space_fallback".into(),
        passed: engine.status_of(stray) == Some(SafetyStatus::WorldSpaceFallback),
        detail: format!("body {:.0} km from observer falls back", far / config.units_per_meter / 1000.0),
    });

    engine.update(0.1);
    let still_fallback = engine.status_of(stray) == Some(SafetyStatus::WorldSpaceFallback);
    if let Ok(mut t) = engine.world.get::<&mut Transform>(stray) {
        t.position = Vec3::new(0.0, 1000.0, 0.0);
    }
    let reenabled = engine.reenable_origin_physics(stray);
    engine.update(0.1);
    results.push(TestResult {
        name: "recovery_fallback_terminal_until_reenabled".into(),
        passed: still_fallback && reenabled && engine.status_of(stray) == Some(SafetyStatus::Stable),
        detail: "fallback persists, then re-enable restores Stable".into(),
    });

    let reset = match BodySnapshot::read(&engine.world, probe) {
        Some(mut snapshot) => {
            engine.safety().reset_actor_to_safe_state(&mut snapshot);
            snapshot.write_back(&mut engine.world);
            Some(snapshot)
        }
        None => None,
    };
    results.push(TestResult {
        name: "recovery_reset_to_safe_state".into(),
        passed: reset.is_some_and(|s| {
            s.transform.position == Vec3::ZERO
                && s.transform.rotation == Rotator::IDENTITY
                && s.velocity == Some(Vec3::ZERO)
        }),
        detail: "position, rotation, velocity zeroed".into(),
    });

    let no_manager = engine.safety().trigger_emergency_recenter(None);
    results.push(TestResult {
        name: "recovery_recenter_requires_manager".into(),
        passed: !no_manager,
        detail: "recenter without an origin manager is refused".into(),
    });

    let stats = engine.safety().statistics();
    results.push(TestResult {
        name: "recovery_operations_counted".into(),
        passed: stats.recovery_operations >= 2,
        detail: format!("{} recovery operations", stats.recovery_operations),
    });

    if verbose {
        for e in engine.safety().recent_safety_events(5) {
            println!("  [{}] {} ({:?})", e.severity, e.message, e.subject);
        }
    }
    results
}

// ── 8. Observer Consensus ───────────────────────────────────────────────

/// `count` observers on a sphere of `radius` metres around `center`.
fn observer_shell(count: usize, center: Vec3, radius: f64) -> Vec<Vec3> {
    let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    (0..count)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            center + Vec3::new(r * theta.cos(), y, r * theta.sin()) * radius
        })
        .collect()
}

fn validate_consensus(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Observer Consensus ---");
    let mut results = Vec::new();
    let safety = safety_for(config);

    // Two observers 10 km apart, target halfway.
    let target = Vec3::new(5000.0, 0.0, 0.0);
    let a = measure_from(0, Vec3::ZERO, target, 0.0);
    let b = measure_from(1, Vec3::new(10_000.0, 0.0, 0.0), target, 0.0);
    let pair = safety.validate_position(&[a, b]);
    let tolerance = safety.validator().tolerance_for(5000.0);
    results.push(TestResult {
        name: "consensus_two_honest".into(),
        passed: pair.valid
            && pair.confidence <= config.consensus.two_observer_confidence_cap
            && pair
                .recovered_position
                .is_some_and(|p| p.distance(&target) <= tolerance),
        detail: format!("confidence {:.2}, error {:.3} m", pair.confidence, pair.geometric_error),
    });

    let mut liar = b;
    liar.distance *= 10.0;
    let lie = safety.validate_position(&[a, liar]);
    results.push(TestResult {
        name: "consensus_two_with_liar".into(),
        passed: !lie.valid && lie.rejection == Some(ConsensusRejection::Inconsistent),
        detail: format!("10× inflated range → error {:.0} m", lie.geometric_error),
    });

    let single = safety.validate_position(&[a]);
    results.push(TestResult {
        name: "consensus_single_rejected".into(),
        passed: !single.valid
            && single.rejection == Some(ConsensusRejection::InsufficientObservers)
            && single.geometric_error.is_infinite(),
        detail: "one observer cannot agree with itself".into(),
    });

    let target = Vec3::new(-1200.0, 400.0, 900.0);
    let shell = |n: usize| -> Vec<ObserverMeasurement> {
        observer_shell(n, Vec3::ZERO, 8000.0)
            .into_iter()
            .enumerate()
            .map(|(i, at)| measure_from(i as u32, at, target, 0.0))
            .collect()
    };
    let three = safety.validate_position(&shell(3));
    let eight = safety.validate_position(&shell(8));
    results.push(TestResult {
        name: "consensus_more_observers_more_confidence".into(),
        passed: three.valid && eight.valid && eight.confidence > three.confidence,
        detail: format!("3 → {:.3}, 8 → {:.3}", three.confidence, eight.confidence),
    });

    results.push(TestResult {
        name: "consensus_confidence_curve".into(),
        passed: (observer_confidence(4) - 0.875).abs() < 1e-12,
        detail: "1 − n^-1.5".into(),
    });

    let solved = eight
        .recovered_position
        .map(|p| p.distance(&target))
        .unwrap_or(f64::INFINITY);
    results.push(TestResult {
        name: "consensus_multilateration".into(),
        passed: solved < 1e-3,
        detail: format!("8 observers solve target to {:.2e} m", solved),
    });

    let mut corrupt = shell(4);
    corrupt[1].direction = Vec3::new(f64::NAN, 0.0, 0.0);
    let bad = safety.validate_position(&corrupt);
    results.push(TestResult {
        name: "consensus_invalid_measurement".into(),
        passed: bad.rejection == Some(ConsensusRejection::InvalidMeasurement { observer_id: 1 }),
        detail: "NaN direction names the observer".into(),
    });

    // Noisy observers in a scene.
    let mut engine = engine_for(config);
    for (i, at) in observer_shell(6, Vec3::ZERO, 300_000.0).into_iter().enumerate() {
        engine.spawn_observer(&format!("station-{}", i), i as u32, at, Vec3::ZERO);
    }
    let probe = engine.spawn_body("probe", Vec3::new(20_000.0, -15_000.0, 5_000.0), Vec3::ZERO, 1.0);
    let fix = engine.validate_target(&mut ObserverFeed::noisy(0.05, 42), probe);
    results.push(TestResult {
        name: "consensus_noisy_scene".into(),
        passed: fix.as_ref().is_some_and(|f| {
            f.result.valid
                && f.position
                    .is_some_and(|p| p.distance(&Vec3::new(20_000.0, -15_000.0, 5_000.0)) < 100.0)
        }),
        detail: match &fix {
            Some(f) => format!("error {:.3} m, confidence {:.2}", f.result.geometric_error, f.result.confidence),
            None => "no observers".into(),
        },
    });

    let failures = safety.statistics().consensus_failures;
    results.push(TestResult {
        name: "consensus_failures_counted".into(),
        passed: failures == 3,
        detail: format!("{} failed validations logged", failures),
    });

    if verbose {
        println!("  tolerance at 5 km: {:.2} m", tolerance);
    }
    results
}

// ── 9. Guarded Scene Run ────────────────────────────────────────────────

fn validate_engine_run(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Guarded Scene ---");
    let mut results = Vec::new();
    let mut engine = engine_for(config);
    let upm = config.units_per_meter;

    // 30 km/s cruise past a planet 6400 km below the start point. The run
    // stops shortly after the ship crosses the emergency distance.
    let cruise = Vec3::new(30_000.0 * upm, 0.0, 0.0);
    let ship = engine.spawn_observer("ship", 0, Vec3::ZERO, cruise);
    let tender = engine.spawn_body("tender", Vec3::new(0.0, 200.0 * upm, 0.0), cruise, 5.0e4);
    let planet = engine.spawn_gravity_well("planet", Vec3::new(0.0, 0.0, -6.4e6 * upm), 5.97e24);

    let steps = 36;
    for _ in 0..steps {
        engine.update(1.0);
    }

    let finite = engine
        .world
        .query::<&Transform>()
        .iter()
        .all(|(_, t)| t.position.is_finite() && t.rotation.is_finite());
    results.push(TestResult {
        name: "scene_all_finite".into(),
        passed: finite,
        detail: format!("{} bodies after {} s", engine.body_count(), steps),
    });

    let shifts = engine.origin.recenter_count();
    let expected_travel = 30_000.0 * steps as f64;
    results.push(TestResult {
        name: "scene_origin_recentered".into(),
        passed: expected_travel <= config.emergency_recenter_distance || shifts >= 1,
        detail: format!(
            "{} recenter(s) over {:.0} km",
            shifts,
            expected_travel / 1000.0
        ),
    });

    let ship_at = engine.absolute_position(ship).unwrap_or(Vec3::ZERO);
    results.push(TestResult {
        name: "scene_absolute_track".into(),
        passed: (ship_at.x / upm - expected_travel).abs() < 1.0,
        detail: format!("ship at {:.1} km", ship_at.x / upm / 1000.0),
    });

    let tender_at = engine.absolute_position(tender).unwrap_or(Vec3::ZERO);
    let relative = (tender_at - ship_at) * (1.0 / upm);
    results.push(TestResult {
        name: "scene_gravity_pulls_tender".into(),
        passed: relative.z < -1000.0 && engine.status_of(tender) == Some(SafetyStatus::Stable),
        detail: format!("tender dropped {:.0} m toward the planet", -relative.z),
    });

    results.push(TestResult {
        name: "scene_planet_in_world_space".into(),
        passed: engine.status_of(planet) == Some(SafetyStatus::WorldSpaceFallback)
            && engine
                .absolute_position(planet)
                .is_some_and(|p| p.distance(&Vec3::new(0.0, 0.0, -6.4e6 * upm)) < 1e-6),
        detail: "distant well keeps absolute coordinates".into(),
    });

    let report = engine.last_integrity();
    results.push(TestResult {
        name: "scene_integrity_report".into(),
        passed: report.evaluated == 3 && report.in_fallback == 1,
        detail: format!("{:?}", report),
    });

    let mut saved = Vec::new();
    let restored = engine.save(&mut saved).ok().and_then(|_| {
        let mut copy = engine_for(config);
        copy.load(&saved[..]).ok().map(|_| copy)
    });
    results.push(TestResult {
        name: "scene_save_load".into(),
        passed: restored.as_ref().is_some_and(|r| {
            r.body_count() == engine.body_count()
                && r.origin.total_shift() == engine.origin.total_shift()
        }),
        detail: format!("{} bytes", saved.len()),
    });

    if verbose {
        let stats = engine.safety().statistics();
        println!(
            "  {} events, {} critical, {} recoveries",
            stats.total_events, stats.critical_events, stats.recovery_operations
        );
    }
    results
}

// ── 10. Correction Wire Format ──────────────────────────────────────────

fn validate_network(config: &SafetyConfiguration, verbose: bool) -> Vec<TestResult> {
    println!("--- Correction Wire Format ---");
    let mut results = Vec::new();
    let safety = safety_for(config);

    let client = Vec3::new(0.0, 0.0, 0.0);
    let server = Vec3::new(30.0 * config.units_per_meter, 0.0, 0.0);
    let report = safety.log_network_desync("rover", &client, &server);
    let correction = plan_correction(7, 0, server, &report);
    results.push(TestResult {
        name: "net_correction_planned".into(),
        passed: correction.is_some_and(|c| c.strength == report.correction_strength),
        detail: format!("30 m → strength {:.3}", report.correction_strength),
    });

    let Some(correction) = correction else {
        return results;
    };
    let decoded = encode_correction(&correction).and_then(|bytes| decode_correction(&bytes));
    results.push(TestResult {
        name: "net_wire_round_trip".into(),
        passed: decoded.as_ref().ok() == Some(&correction),
        detail: "bincode encode → decode".into(),
    });

    let blended = correction.apply(client);
    let expected = client.lerp(&server, correction.strength);
    results.push(TestResult {
        name: "net_blend".into(),
        passed: blended.distance(&expected) < 1e-9,
        detail: format!("client moved {:.1} m", blended.length() / config.units_per_meter),
    });

    let mut sequencer = CorrectionSequencer::new();
    let first = sequencer.accept(&correction).is_ok();
    let replay = sequencer.accept(&correction);
    results.push(TestResult {
        name: "net_stale_rejected".into(),
        passed: first && matches!(replay, Err(NetError::Stale { .. })),
        detail: "replayed sequence dropped".into(),
    });

    let truncated = encode_correction(&correction)
        .map(|bytes| decode_correction(&bytes[..bytes.len() / 2]).is_err())
        .unwrap_or(false);
    results.push(TestResult {
        name: "net_truncated_rejected".into(),
        passed: truncated,
        detail: "half a message does not decode".into(),
    });

    if verbose {
        println!("  correction {:?}", correction);
    }
    results
}
