//! Property tests for the guard invariants.
//!
//! Each property is checked over generated inputs rather than a fixed grid.

use proptest::prelude::*;
use skyscale_logic::config::SafetyConfiguration;
use skyscale_logic::desync::network_correction_strength;
use skyscale_logic::events::{SafetyEvent, SafetyEventLog, SafetySeverity};
use skyscale_logic::force::{clamp_gravitational_force, g_force};
use skyscale_logic::scale::{clamp_scale_factor, safe_scale_factor};
use skyscale_logic::vector::Vec3;

fn config() -> SafetyConfiguration {
    SafetyConfiguration::default()
}

fn any_f64() -> impl Strategy<Value = f64> {
    prop_oneof![
        prop::num::f64::ANY,
        -1e12..1e12f64,
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(0.0),
    ]
}

proptest! {
    #[test]
    fn clamped_scale_is_always_in_range(factor in any_f64()) {
        let c = config();
        let value = clamp_scale_factor(factor, &c).value;
        prop_assert!(value >= c.min_scale_factor && value <= c.max_scale_factor);
    }

    #[test]
    fn safe_scale_never_increases_with_distance(a in 1e-3..1e15f64, b in 1e-3..1e15f64) {
        let c = config();
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(safe_scale_factor(near, &c) >= safe_scale_factor(far, &c));
    }

    #[test]
    fn clamped_force_respects_g_cap(
        x in -1e15..1e15f64,
        y in -1e15..1e15f64,
        z in -1e15..1e15f64,
        mass in 0.01..1e9f64,
        max_g in 0.1..500.0f64,
    ) {
        let c = config();
        let clamp = clamp_gravitational_force(Vec3::new(x, y, z), mass, Some(max_g), &c);
        prop_assert!(g_force(&clamp.force, mass) <= max_g * (1.0 + 1e-9));
    }

    #[test]
    fn event_log_is_bounded(capacity in 1usize..64, pushes in 0usize..300) {
        let mut log = SafetyEventLog::new(capacity);
        for n in 0..pushes {
            log.push(SafetyEvent {
                severity: SafetySeverity::Info,
                message: n.to_string(),
                subject: None,
                timestamp: n as f64,
            });
            prop_assert!(log.len() <= capacity);
        }
        if pushes > 0 {
            let newest = log.recent(1);
            prop_assert_eq!(&newest[0].message, &(pushes - 1).to_string());
            let oldest = pushes.saturating_sub(capacity);
            prop_assert_eq!(log.iter().next().map(|e| e.message.clone()), Some(oldest.to_string()));
        }
    }

    #[test]
    fn correction_strength_is_monotonic(a in 0.0..200.0f64, b in 0.0..200.0f64) {
        let c = config();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let s_low = network_correction_strength(low, &c);
        let s_high = network_correction_strength(high, &c);
        prop_assert!(s_low <= s_high);
        prop_assert!((0.0..=1.0).contains(&s_low) && (0.0..=1.0).contains(&s_high));
    }
}
