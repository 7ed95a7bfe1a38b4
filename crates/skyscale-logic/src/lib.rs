//! Pure scaling-safety and consensus logic for SkyScale.
//!
//! This crate keeps a physics simulation numerically sound when bodies span
//! centimetres to millions of kilometres around a stationary observer, and
//! lets independent observers agree on a shared object's position using
//! only their own relative measurements. Nothing here depends on an engine,
//! a database or a runtime; functions take plain data and return results.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Session-wide bounds and feature flags, with validation |
//! | [`consensus`] | Multi-observer triangulation consensus and multilateration |
//! | [`desync`] | Client/server divergence grading and correction messages |
//! | [`events`] | Severity-tagged, FIFO-evicting event log and statistics |
//! | [`force`] | G-force capped gravity and scale-dependent velocity limits |
//! | [`precision`] | Floating-point precision detection and thresholds |
//! | [`recovery`] | Entity/origin traits, repairs, and the safety state machine |
//! | [`safety`] | The shared [`CelestialSafetySystem`](safety::CelestialSafetySystem) service |
//! | [`scale`] | Scale factor clamping and the inverse-square-root safe scale law |
//! | [`vector`] | Double-precision `Vec3` and `Rotator` |

pub mod config;
pub mod consensus;
pub mod desync;
pub mod events;
pub mod force;
pub mod precision;
pub mod recovery;
pub mod safety;
pub mod scale;
pub mod vector;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::{ConfigError, ConsensusConfig, SafetyConfiguration};
    pub use crate::consensus::{
        ConsensusRejection, ConsensusResult, ObserverMeasurement, TriangulationConsensusValidator,
    };
    pub use crate::desync::{DesyncReport, PositionCorrection};
    pub use crate::events::{SafetyEvent, SafetySeverity, SafetyStatistics};
    pub use crate::recovery::{OriginManager, PhysicsEntity, SafetyStatus};
    pub use crate::safety::CelestialSafetySystem;
    pub use crate::vector::{Rotator, Vec3};
}
