//! Components attached to simulated bodies, gravity wells and observers.
//!
//! Positions are in engine units (see `units_per_meter`); velocities in
//! engine units per second; masses in kilograms.

use serde::{Deserialize, Serialize};
use skyscale_logic::vector::{Rotator, Vec3};

/// Where a body is and how it is oriented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Rotator,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Rotator::IDENTITY,
        }
    }
}

/// Linear velocity in engine units per second.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity(pub Vec3);

/// Inertial mass in kilograms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Mass(pub f64);

/// A body that attracts every other massive body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GravityWell {
    /// Attracting mass in kilograms.
    pub mass: f64,
}

/// Display name, also the key for safety status tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// An entity that reports measurements of shared targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Observer {
    pub id: u32,
}

/// Network identity for replicated bodies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NetId(pub u64);

/// Which coordinate frame a body's `Transform` is expressed in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameMode {
    /// `true`: relative to the floating origin. `false`: absolute world space.
    pub origin_relative: bool,
}

impl Default for FrameMode {
    fn default() -> Self {
        Self {
            origin_relative: true,
        }
    }
}

/// Scale factor the local frame currently uses, refreshed every tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LocalScale(pub f64);

impl Default for LocalScale {
    fn default() -> Self {
        Self(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert!(FrameMode::default().origin_relative);
        assert_eq!(LocalScale::default().0, 1.0);
        assert_eq!(Transform::at(Vec3::new(1.0, 2.0, 3.0)).rotation, Rotator::IDENTITY);
        assert_eq!(Name::new("probe").0, "probe");
    }
}
