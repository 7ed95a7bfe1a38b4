//! Reconciliation - server-side correction planning and client-side application

use hecs::{Entity, World};
use skyscale_logic::desync::{plan_correction, PositionCorrection};
use skyscale_logic::safety::CelestialSafetySystem;
use skyscale_logic::vector::Vec3;

use crate::components::{Name, NetId, Transform};
use crate::net::{CorrectionSequencer, NetError};

/// Compare a client's reported position against the authoritative one.
///
/// Every comparison is logged as a desync event. Returns the correction to
/// send, or `None` when the client is within tolerance.
pub fn plan_position_correction(
    world: &World,
    safety: &CelestialSafetySystem,
    sequencer: &mut CorrectionSequencer,
    entity: Entity,
    client_position: Vec3,
) -> Result<Option<PositionCorrection>, NetError> {
    let net_id = world
        .get::<&NetId>(entity)
        .map(|id| id.0)
        .map_err(|_| NetError::UnknownEntity {
            entity_id: u64::from(entity.id()),
        })?;
    let server_position = world
        .get::<&Transform>(entity)
        .map(|t| t.position)
        .map_err(|_| NetError::UnknownEntity { entity_id: net_id })?;
    let subject = world
        .get::<&Name>(entity)
        .map(|n| n.0.clone())
        .unwrap_or_else(|_| format!("net-{}", net_id));

    let report = safety.log_network_desync(&subject, &client_position, &server_position);
    if safety.is_desync_acceptable(report.error_distance) {
        return Ok(None);
    }
    Ok(plan_correction(
        net_id,
        sequencer.next_sequence(net_id),
        server_position,
        &report,
    ))
}

/// Apply a received correction to the replicated body with the same `NetId`.
///
/// Returns the body's new position. Stale corrections leave it untouched.
pub fn apply_position_correction(
    world: &mut World,
    sequencer: &mut CorrectionSequencer,
    correction: &PositionCorrection,
) -> Result<Vec3, NetError> {
    let entity = world
        .query::<&NetId>()
        .iter()
        .find(|(_, id)| id.0 == correction.entity_id)
        .map(|(e, _)| e)
        .ok_or(NetError::UnknownEntity {
            entity_id: correction.entity_id,
        })?;
    sequencer.accept(correction)?;

    let mut transform = world
        .get::<&mut Transform>(entity)
        .map_err(|_| NetError::UnknownEntity {
            entity_id: correction.entity_id,
        })?;
    transform.position = correction.apply(transform.position);
    Ok(transform.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscale_logic::config::SafetyConfiguration;
    use skyscale_logic::events::SafetySeverity;

    fn safety() -> CelestialSafetySystem {
        CelestialSafetySystem::init(SafetyConfiguration::default()).expect("default config")
    }

    #[test]
    fn small_drift_needs_no_correction() {
        let safety = safety();
        let mut sequencer = CorrectionSequencer::new();
        let mut world = World::new();
        let rover = world.spawn((Name::new("rover"), NetId(9), Transform::default()));

        // 50 cm off: half a metre, inside the 1 m tolerance.
        let planned = plan_position_correction(
            &world,
            &safety,
            &mut sequencer,
            rover,
            Vec3::new(50.0, 0.0, 0.0),
        )
        .expect("known entity");
        assert!(planned.is_none());
        assert_eq!(safety.statistics().desync_events, 1);
    }

    #[test]
    fn large_drift_is_pulled_back() {
        let safety = safety();
        let mut server_seq = CorrectionSequencer::new();
        let mut client_seq = CorrectionSequencer::new();
        let mut server = World::new();
        let mut client = World::new();
        let server_rover = server.spawn((Name::new("rover"), NetId(9), Transform::default()));
        let client_rover = client.spawn((NetId(9), Transform::at(Vec3::new(20_000.0, 0.0, 0.0))));

        // 200 m off: past the critical distance, full-strength snap.
        let correction = plan_position_correction(
            &server,
            &safety,
            &mut server_seq,
            server_rover,
            Vec3::new(20_000.0, 0.0, 0.0),
        )
        .expect("known entity")
        .expect("correction needed");
        assert_eq!(correction.strength, 1.0);
        assert_eq!(correction.sequence, 0);
        assert_eq!(
            safety.recent_safety_events(1)[0].severity,
            SafetySeverity::Critical
        );

        let moved = apply_position_correction(&mut client, &mut client_seq, &correction)
            .expect("applied");
        assert_eq!(moved, Vec3::ZERO);
        assert_eq!(
            client.get::<&Transform>(client_rover).expect("transform").position,
            Vec3::ZERO
        );

        // Replaying the same message is rejected.
        assert!(matches!(
            apply_position_correction(&mut client, &mut client_seq, &correction),
            Err(NetError::Stale { .. })
        ));
    }

    #[test]
    fn unknown_entities_are_reported() {
        let safety = safety();
        let mut sequencer = CorrectionSequencer::new();
        let mut world = World::new();
        let anonymous = world.spawn((Transform::default(),));
        assert!(matches!(
            plan_position_correction(&world, &safety, &mut sequencer, anonymous, Vec3::ZERO),
            Err(NetError::UnknownEntity { .. })
        ));

        let stray = PositionCorrection {
            entity_id: 404,
            sequence: 0,
            server_position: Vec3::ZERO,
            strength: 1.0,
        };
        assert!(matches!(
            apply_position_correction(&mut world, &mut sequencer, &stray),
            Err(NetError::UnknownEntity { entity_id: 404 })
        ));
    }
}
