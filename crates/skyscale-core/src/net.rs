//! Position correction messages on the wire.
//!
//! Corrections travel as bincode-encoded [`PositionCorrection`]s. The
//! receiving side keeps the last sequence number seen per entity and drops
//! anything older, so reordered packets never pull a body backwards.

use std::collections::HashMap;

use skyscale_logic::desync::PositionCorrection;

/// Encode a correction for transport.
pub fn encode_correction(correction: &PositionCorrection) -> Result<Vec<u8>, NetError> {
    Ok(bincode::serialize(correction)?)
}

/// Decode and sanity-check a received correction.
pub fn decode_correction(bytes: &[u8]) -> Result<PositionCorrection, NetError> {
    let correction: PositionCorrection = bincode::deserialize(bytes)?;
    if !correction.server_position.is_finite() || !correction.strength.is_finite() {
        return Err(NetError::NonFinite {
            entity_id: correction.entity_id,
        });
    }
    Ok(correction)
}

/// Per-entity sequence tracking for incoming corrections.
#[derive(Debug, Clone, Default)]
pub struct CorrectionSequencer {
    last_seen: HashMap<u64, u32>,
    next_outgoing: HashMap<u64, u32>,
}

impl CorrectionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number for the next outgoing correction of `entity_id`.
    pub fn next_sequence(&mut self, entity_id: u64) -> u32 {
        let slot = self.next_outgoing.entry(entity_id).or_insert(0);
        let sequence = *slot;
        *slot = slot.wrapping_add(1);
        sequence
    }

    /// Accept a correction unless an equal or newer one was already applied.
    pub fn accept(&mut self, correction: &PositionCorrection) -> Result<(), NetError> {
        if let Some(&last) = self.last_seen.get(&correction.entity_id) {
            if correction.sequence <= last {
                return Err(NetError::Stale {
                    entity_id: correction.entity_id,
                    sequence: correction.sequence,
                    last,
                });
            }
        }
        self.last_seen
            .insert(correction.entity_id, correction.sequence);
        Ok(())
    }
}

/// Errors that can occur while exchanging corrections
#[derive(Debug)]
pub enum NetError {
    Bincode(Box<bincode::ErrorKind>),
    NonFinite { entity_id: u64 },
    UnknownEntity { entity_id: u64 },
    Stale { entity_id: u64, sequence: u32, last: u32 },
}

impl From<Box<bincode::ErrorKind>> for NetError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        NetError::Bincode(e)
    }
}

impl std::fmt::Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetError::Bincode(e) => write!(f, "Serialization error: {}", e),
            NetError::NonFinite { entity_id } => {
                write!(f, "Correction for entity {} carries non-finite values", entity_id)
            }
            NetError::UnknownEntity { entity_id } => {
                write!(f, "No replicated entity with id {}", entity_id)
            }
            NetError::Stale {
                entity_id,
                sequence,
                last,
            } => write!(
                f,
                "Stale correction for entity {}: sequence {} after {}",
                entity_id, sequence, last
            ),
        }
    }
}

impl std::error::Error for NetError {}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscale_logic::vector::Vec3;

    fn correction(sequence: u32) -> PositionCorrection {
        PositionCorrection {
            entity_id: 42,
            sequence,
            server_position: Vec3::new(1.5, -2.0, 1e9),
            strength: 0.75,
        }
    }

    #[test]
    fn wire_round_trip() {
        let bytes = encode_correction(&correction(3)).expect("encode");
        assert_eq!(decode_correction(&bytes).expect("decode"), correction(3));
    }

    #[test]
    fn truncated_message_is_rejected() {
        let bytes = encode_correction(&correction(3)).expect("encode");
        assert!(matches!(
            decode_correction(&bytes[..bytes.len() - 4]),
            Err(NetError::Bincode(_))
        ));
    }

    #[test]
    fn non_finite_payload_is_rejected() {
        let mut bad = correction(0);
        bad.server_position.x = f64::NAN;
        let bytes = encode_correction(&bad).expect("encode");
        assert!(matches!(
            decode_correction(&bytes),
            Err(NetError::NonFinite { entity_id: 42 })
        ));
    }

    #[test]
    fn stale_corrections_are_dropped() {
        let mut sequencer = CorrectionSequencer::new();
        assert!(sequencer.accept(&correction(5)).is_ok());
        assert!(matches!(
            sequencer.accept(&correction(5)),
            Err(NetError::Stale { last: 5, .. })
        ));
        assert!(sequencer.accept(&correction(2)).is_err());
        assert!(sequencer.accept(&correction(6)).is_ok());
    }

    #[test]
    fn outgoing_sequences_increment_per_entity() {
        let mut sequencer = CorrectionSequencer::new();
        assert_eq!(sequencer.next_sequence(1), 0);
        assert_eq!(sequencer.next_sequence(1), 1);
        assert_eq!(sequencer.next_sequence(2), 0);
    }
}
