//! Floating origin - keeps origin-relative coordinates small.
//!
//! Recentering moves the origin onto the active observer and translates every
//! origin-relative body by the same offset, so relative geometry is preserved
//! while absolute magnitudes shrink. Bodies in world-space fallback keep
//! absolute coordinates and are never shifted.

use hecs::{Entity, World};
use skyscale_logic::recovery::OriginManager;
use skyscale_logic::vector::Vec3;

use crate::components::{FrameMode, Transform};

/// Origin manager backed by the ECS world.
#[derive(Debug, Clone, Default)]
pub struct FloatingOrigin {
    observer: Option<Entity>,
    observer_position: Vec3,
    pending_shift: Option<Vec3>,
    /// Sum of every shift applied so far: absolute = relative + total_shift.
    total_shift: Vec3,
    recenter_count: u32,
}

impl FloatingOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_observer(&mut self, observer: Option<Entity>) {
        self.observer = observer;
    }

    pub fn observer(&self) -> Option<Entity> {
        self.observer
    }

    /// Re-read the observer's position; call before evaluating bodies.
    pub fn refresh(&mut self, world: &World) {
        self.observer_position = self
            .observer
            .and_then(|e| world.get::<&Transform>(e).ok().map(|t| t.position))
            .filter(|p| p.is_finite())
            .unwrap_or(Vec3::ZERO);
    }

    pub fn total_shift(&self) -> Vec3 {
        self.total_shift
    }

    /// Reinstate a shift recorded by an earlier session.
    pub fn restore_shift(&mut self, total_shift: Vec3) {
        self.total_shift = total_shift;
        self.pending_shift = None;
    }

    pub fn recenter_count(&self) -> u32 {
        self.recenter_count
    }

    pub fn has_pending_shift(&self) -> bool {
        self.pending_shift.is_some()
    }

    /// Absolute position for an origin-relative one.
    pub fn to_absolute(&self, relative: Vec3) -> Vec3 {
        relative + self.total_shift
    }

    /// Origin-relative position for an absolute one.
    pub fn to_relative(&self, absolute: Vec3) -> Vec3 {
        absolute - self.total_shift
    }

    /// Position of a body in the origin-relative frame, whatever frame it is stored in.
    pub fn relative_position(&self, transform: &Transform, frame: Option<&FrameMode>) -> Vec3 {
        match frame {
            Some(FrameMode {
                origin_relative: false,
            }) => self.to_relative(transform.position),
            _ => transform.position,
        }
    }

    /// Apply a pending recenter to the world. Returns the shift, if any.
    pub fn apply_pending(&mut self, world: &mut World) -> Option<Vec3> {
        let shift = self.pending_shift.take()?;
        for (_, (transform, frame)) in world
            .query_mut::<(&mut Transform, Option<&FrameMode>)>()
        {
            if frame.map_or(true, |f| f.origin_relative) {
                transform.position = transform.position - shift;
            }
        }
        self.total_shift = self.total_shift + shift;
        self.observer_position = self.observer_position - shift;
        log::info!(
            "Origin recentered by ({:.1}, {:.1}, {:.1}); total shift ({:.1}, {:.1}, {:.1})",
            shift.x,
            shift.y,
            shift.z,
            self.total_shift.x,
            self.total_shift.y,
            self.total_shift.z
        );
        Some(shift)
    }
}

impl OriginManager for FloatingOrigin {
    fn recenter_on_observer(&mut self) {
        self.pending_shift = Some(self.observer_position);
        self.recenter_count += 1;
    }

    fn observer_position(&self) -> Vec3 {
        self.observer_position
    }
}
