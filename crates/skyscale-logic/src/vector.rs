//! Double-precision vector and rotation types shared by every guard.

use serde::{Deserialize, Serialize};

/// 3D vector in world units (or physical units, depending on the caller).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length_squared(&self) -> f64 {
        self.dot(self)
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance(&self, other: &Self) -> f64 {
        (*self - *other).length()
    }

    /// Unit vector in the same direction, or zero for a zero-length vector.
    ///
    /// Finite vectors whose squared length overflows are rescaled by their
    /// largest component first, so their direction survives.
    pub fn normalize(&self) -> Self {
        if !self.is_finite() {
            return Self::ZERO;
        }
        let largest = self.max_abs_component();
        if largest == 0.0 {
            return Self::ZERO;
        }
        let scaled = Self::new(self.x / largest, self.y / largest, self.z / largest);
        let len = scaled.length();
        if len > 0.0 && len.is_finite() {
            scaled * (1.0 / len)
        } else {
            Self::ZERO
        }
    }

    pub fn max_abs_component(&self) -> f64 {
        self.x.abs().max(self.y.abs()).max(self.z.abs())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Linear blend toward `target`; `t = 0` keeps `self`, `t = 1` lands on `target`.
    pub fn lerp(&self, target: &Self, t: f64) -> Self {
        *self + (*target - *self) * t
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        self * -1.0
    }
}

/// Orientation as a pitch/yaw/roll triple in degrees.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rotator {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotator {
    pub const IDENTITY: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}
