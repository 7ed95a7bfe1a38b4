//! SkyScale Core - ECS host for the celestial safety system
//!
//! Runs bodies, gravity wells and observers in a `hecs` world and routes
//! every tick through the guards, monitors and recovery coordinator of
//! `skyscale-logic`.
//!
//! # Architecture
//!
//! | Module | Role |
//! |--------|------|
//! | `components` | Pure data: transforms, velocities, masses, observers, frame mode |
//! | `origin` | Floating origin that recenters on the active observer |
//! | `entity` | Snapshot adapter exposing a body as a `PhysicsEntity` |
//! | `systems` | Gravity, integration, integrity, observation, reconciliation |
//! | `net` | Bincode wire format and sequencing for position corrections |
//! | `settings` | JSON configuration loading |
//! | `persistence` | Scene save/load |
//! | `engine` | `SafetyEngine`, the per-tick driver |
//!
//! # Example
//!
//! ```rust,no_run
//! use skyscale_core::prelude::*;
//!
//! let mut engine = SafetyEngine::new(SafetyConfiguration::default()).unwrap();
//! engine.spawn_observer("ship", 0, Vec3::ZERO, Vec3::new(5_000.0, 0.0, 0.0));
//!
//! loop {
//!     engine.update(1.0 / 60.0);
//! }
//! ```

pub mod components;
pub mod engine;
pub mod entity;
pub mod net;
pub mod origin;
pub mod persistence;
pub mod settings;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::SafetyEngine;
    pub use crate::origin::FloatingOrigin;
    pub use crate::systems::{ObserverFeed, TargetFix};
    pub use skyscale_logic::prelude::*;
}
