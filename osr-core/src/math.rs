//! Rigid transforms and blending helpers
//!
//! Coordinate system: right-handed, world space, meters
//! - X: Right
//! - Y: Up
//! - Z: Forward

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f32>;
pub type Quat = UnitQuaternion<f32>;

/// Smallest time span allowed as an interpolation denominator
pub const TIME_EPSILON: f32 = 0.001;

/// Position, rotation and scale of an object in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::repeat(1.0),
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::identity())
    }

    /// Unit vector pointing along the local +Z axis
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::z()
    }

    /// World-space point at `local` offset from this transform
    pub fn offset_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    /// Blend towards `other`: position and scale linearly, rotation spherically
    pub fn blend(&self, other: &Transform, alpha: f32) -> Transform {
        Transform {
            position: self.position.lerp(&other.position, alpha),
            rotation: slerp(&self.rotation, &other.rotation, alpha),
            scale: self.scale.lerp(&other.scale, alpha),
        }
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Spherical interpolation that never panics
///
/// Rotations half a turn apart have no unique shortest arc; those step at
/// the midpoint instead.
pub fn slerp(a: &Quat, b: &Quat, t: f32) -> Quat {
    a.try_slerp(b, t, 1.0e-6)
        .unwrap_or(if t < 0.5 { *a } else { *b })
}

/// Rotation whose +Z axis points from `from` towards `to`
///
/// Returns `fallback` when the direction is degenerate (zero length or
/// parallel to world up).
pub fn look_at(from: &Vec3, to: &Vec3, fallback: Quat) -> Quat {
    let dir = to - from;
    let up = Vec3::y();
    if dir.norm_squared() < 1.0e-8 || dir.cross(&up).norm_squared() < 1.0e-8 {
        return fallback;
    }
    Quat::face_towards(&dir, &up)
}

/// Interpolation factor of `t` between `start` and `end`, guarded against
/// zero-length spans
pub fn span_alpha(t: f32, start: f32, end: f32) -> f32 {
    (t - start) / (end - start).max(TIME_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_lerp_midpoint() {
        assert!((lerp(10.0, 20.0, 0.5) - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_blend_endpoints_are_exact() {
        let a = Transform::new(Vec3::new(0.0, 0.0, 0.0), Quat::identity());
        let b = Transform::new(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2),
        );
        assert_eq!(a.blend(&b, 0.0), a);
        let end = a.blend(&b, 1.0);
        assert!((end.position - b.position).norm() < 1e-5);
        assert!(end.rotation.angle_to(&b.rotation) < 1e-4);
    }

    #[test]
    fn test_slerp_halfway_rotation() {
        let a = Quat::identity();
        let b = Quat::from_axis_angle(&Vec3::y_axis(), FRAC_PI_2);
        let mid = slerp(&a, &b, 0.5);
        assert!((mid.angle() - FRAC_PI_2 / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_look_at_points_forward_axis_at_target() {
        let from = Vec3::new(0.0, 0.0, 0.0);
        let to = Vec3::new(10.0, 0.0, 0.0);
        let rot = look_at(&from, &to, Quat::identity());
        let fwd = rot * Vec3::z();
        assert!((fwd - Vec3::x()).norm() < 1e-5);
    }

    #[test]
    fn test_look_at_degenerate_uses_fallback() {
        let fallback = Quat::from_axis_angle(&Vec3::x_axis(), 0.3);
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(look_at(&p, &p, fallback), fallback);
        let above = Vec3::new(1.0, 12.0, 3.0);
        assert_eq!(look_at(&above, &p, fallback), fallback);
    }

    #[test]
    fn test_span_alpha_guards_zero_span() {
        let alpha = span_alpha(1.0, 1.0, 1.0);
        assert!(alpha.is_finite());
        assert_eq!(alpha, 0.0);
    }
}
