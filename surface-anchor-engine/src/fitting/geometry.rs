//! Fitted primitive types and their orientation canonicalization.
//!
//! Extrinsics are column-major affine matrices: columns x/y/z are the
//! primitive's basis axes, the last column its position. The y axis carries
//! the primitive's defining direction (plane normal, cylinder/cone/torus
//! axis).

use std::f32::consts::TAU;

use bevy::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use constants::detection::{FULL_RING_MIN_PROJECTION, HORIZONTAL_PLANE_ANGLE};

use crate::engine::session::PoseExt;

/// `acos` of the dot product, clamped against rounding drift.
pub(crate) fn angle_between(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

/// Angle from `a` to `b`, signed against the fixed reference (0, -1, 0).
fn signed_angle(a: Vec3, b: Vec3) -> f32 {
    let angle = angle_between(a, b);
    if Vec3::NEG_Y.dot(a.cross(b)) < 0.0 {
        -angle
    } else {
        angle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    #[serde(with = "crate::codec::mat4")]
    pub extrinsics: Mat4,
    pub width: f32,
    pub height: f32,
}

impl Plane {
    pub fn normal(&self) -> Vec3 {
        self.extrinsics.basis_y()
    }

    pub fn center(&self) -> Vec3 {
        self.extrinsics.position()
    }

    pub fn world_to_local(&self) -> Mat4 {
        self.extrinsics.inverse()
    }

    /// Spins the frame half a turn about the normal when the fit came out
    /// facing away from the viewer: a ceiling seen from below keeps its
    /// normal but must not present its back face, and likewise for floors
    /// and walls.
    pub fn align(&mut self, gesture: Vec3, device_position: Vec3) {
        let up = Vec3::Y;
        let looking = (gesture - device_position).normalize();
        let looking_up = up.dot(looking) > 0.0;
        let normal = self.normal();
        let horizontal = angle_between(normal, up) < HORIZONTAL_PLANE_ANGLE
            || angle_between(-normal, up) < HORIZONTAL_PLANE_ANGLE;
        let spin = if horizontal {
            // Looking up at a normal that points up (or down at one that
            // points down) means the fit faces away.
            if looking_up {
                normal.dot(up) > 0.0
            } else {
                normal.dot(up) < 0.0
            }
        } else {
            looking.dot(normal) > 0.0
        };
        if spin {
            self.extrinsics.x_axis = -self.extrinsics.x_axis;
            self.extrinsics.z_axis = -self.extrinsics.z_axis;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    #[serde(with = "crate::codec::mat4")]
    pub extrinsics: Mat4,
    pub radius: f32,
}

impl Sphere {
    pub fn center(&self) -> Vec3 {
        self.extrinsics.position()
    }

    pub fn world_to_local(&self) -> Mat4 {
        self.extrinsics.inverse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    #[serde(with = "crate::codec::mat4")]
    pub extrinsics: Mat4,
    pub height: f32,
    pub radius: f32,
}

impl Cylinder {
    pub fn axis(&self) -> Vec3 {
        self.extrinsics.basis_y()
    }

    pub fn center(&self) -> Vec3 {
        self.extrinsics.position()
    }

    pub fn world_to_local(&self) -> Mat4 {
        self.extrinsics.inverse()
    }

    /// Canonical orientation: axis y component never negative.
    pub fn aligned(&self) -> Cylinder {
        if self.axis().y >= 0.0 {
            return *self;
        }
        let mut flipped = *self;
        flipped.extrinsics.y_axis = -self.extrinsics.y_axis;
        flipped.extrinsics.z_axis = -self.extrinsics.z_axis;
        flipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cone {
    #[serde(with = "crate::codec::mat4")]
    pub extrinsics: Mat4,
    pub height: f32,
    pub top_radius: f32,
    pub bottom_radius: f32,
}

impl Cone {
    pub fn axis(&self) -> Vec3 {
        self.extrinsics.basis_y()
    }

    pub fn center(&self) -> Vec3 {
        self.extrinsics.position()
    }

    pub fn top(&self) -> Vec3 {
        self.center() + self.axis() * (self.height * 0.5)
    }

    pub fn bottom(&self) -> Vec3 {
        self.center() - self.axis() * (self.height * 0.5)
    }

    /// Where the lateral surface would close if extended past the top.
    pub fn vertex(&self) -> Vec3 {
        let taper = self.bottom_radius - self.top_radius;
        if taper <= 1e-6 {
            return self.top();
        }
        self.top() + self.axis() * (self.top_radius * self.height / taper)
    }

    pub fn world_to_local(&self) -> Mat4 {
        self.extrinsics.inverse()
    }

    /// Extends the frustum to its apex: the top radius collapses to zero,
    /// the bottom rim stays put and the center slides up the axis by half
    /// the added height.
    pub fn extended_to_apex(&self) -> Cone {
        let slope = self.height / (self.bottom_radius - self.top_radius);
        let full_height = self.bottom_radius * slope;
        let displacement = (full_height - self.height).abs();
        let mut extended = *self;
        extended.height = full_height;
        extended.top_radius = 0.0;
        extended.extrinsics =
            Mat4::from_translation(self.axis() * (displacement * 0.5)) * self.extrinsics;
        extended
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    #[serde(with = "crate::codec::mat4")]
    pub extrinsics: Mat4,
    pub mean_radius: f32,
    pub tube_radius: f32,
}

impl Torus {
    pub fn axis(&self) -> Vec3 {
        self.extrinsics.basis_y()
    }

    pub fn center(&self) -> Vec3 {
        self.extrinsics.position()
    }

    pub fn world_to_local(&self) -> Mat4 {
        self.extrinsics.inverse()
    }

    /// Canonical orientation: axis y component never negative.
    pub fn aligned(&self) -> Torus {
        if self.axis().y >= 0.0 {
            return *self;
        }
        let mut flipped = *self;
        flipped.extrinsics.y_axis = -self.extrinsics.y_axis;
        flipped.extrinsics.z_axis = -self.extrinsics.z_axis;
        flipped
    }

    /// Angular extent covered by the local-space inliers, as
    /// `(begin_angle, delta_angle)` around the torus axis measured from the
    /// local x axis. Inliers spread evenly around the ring produce a full
    /// circle.
    pub fn calc_angle_range(&self, local_inliers: &[Vec3]) -> (f32, f32) {
        if local_inliers.is_empty() {
            return (0.0, TAU);
        }
        let projected: Vec<Vec3> = local_inliers
            .iter()
            .map(|point| Vec3::new(point.x, 0.0, point.z).normalize_or_zero())
            .collect();
        let mean = projected.iter().copied().sum::<Vec3>() / projected.len() as f32;
        if mean.length() < FULL_RING_MIN_PROJECTION {
            return (0.0, TAU);
        }
        let mean = mean.normalize();
        let base_angle = signed_angle(Vec3::X, mean);
        let mut min_angle = f32::INFINITY;
        let mut max_angle = f32::NEG_INFINITY;
        for direction in &projected {
            let angle = signed_angle(mean, *direction);
            min_angle = min_angle.min(angle);
            max_angle = max_angle.max(angle);
        }
        (min_angle + base_angle, max_angle - min_angle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::extrinsics;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn plane_with_normal(normal: Vec3) -> Plane {
        let x = if normal.abs().y > 0.9 { Vec3::X } else { Vec3::Y.cross(normal).normalize() };
        let z = x.cross(normal).normalize();
        Plane {
            extrinsics: extrinsics(x, normal, z, Vec3::ZERO),
            width: 1.0,
            height: 1.0,
        }
    }

    #[test]
    fn wall_plane_facing_away_spins_about_its_normal() {
        // Device at +z gazing along -z; a normal also along -z faces away
        // and gets spun.
        let mut plane = plane_with_normal(Vec3::NEG_Z);
        let before = plane.extrinsics;
        plane.align(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(plane.extrinsics.y_axis, before.y_axis);
        assert_eq!(plane.extrinsics.x_axis, -before.x_axis);
        assert_eq!(plane.extrinsics.z_axis, -before.z_axis);

        // Normal already toward the device: untouched.
        let mut facing = plane_with_normal(Vec3::Z);
        let unchanged = facing.extrinsics;
        facing.align(Vec3::ZERO, Vec3::new(0.0, 0.0, 3.0));
        assert_eq!(facing.extrinsics, unchanged);
    }

    #[test]
    fn floor_seen_from_above_spins_when_normal_points_down() {
        let mut plane = plane_with_normal(Vec3::NEG_Y);
        let before = plane.extrinsics;
        plane.align(Vec3::ZERO, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(plane.extrinsics.x_axis, -before.x_axis);
        assert_eq!(plane.extrinsics.z_axis, -before.z_axis);

        let mut upright = plane_with_normal(Vec3::Y);
        let unchanged = upright.extrinsics;
        upright.align(Vec3::ZERO, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(upright.extrinsics, unchanged);
    }

    #[test]
    fn aligned_cylinder_axis_never_points_down() {
        let cylinder = Cylinder {
            extrinsics: extrinsics(Vec3::X, Vec3::NEG_Y, Vec3::NEG_Z, Vec3::ONE),
            height: 1.0,
            radius: 0.2,
        };
        let aligned = cylinder.aligned();
        assert_eq!(aligned.axis(), Vec3::Y);
        // Right-handedness preserved: x cross y equals z.
        let z = aligned.extrinsics.basis_x().cross(aligned.axis());
        assert!((z - aligned.extrinsics.basis_z()).length() < 1e-6);
        assert_eq!(aligned.center(), cylinder.center());
    }

    #[test]
    fn cone_extends_to_its_apex() {
        let cone = Cone {
            extrinsics: Mat4::IDENTITY,
            height: 1.0,
            top_radius: 0.05,
            bottom_radius: 0.55,
        };
        let full = cone.extended_to_apex();
        assert_eq!(full.top_radius, 0.0);
        assert!((full.height - 1.1).abs() < 1e-5);
        // Bottom rim stays put, the apex replaces the cut top.
        assert!((full.bottom() - cone.bottom()).length() < 1e-5);
        assert!((full.top() - cone.vertex()).length() < 1e-4);
    }

    #[test]
    fn half_ring_inliers_span_half_a_turn() {
        let torus = Torus {
            extrinsics: Mat4::IDENTITY,
            mean_radius: 1.0,
            tube_radius: 0.1,
        };
        // Points over x in [-pi/2, pi/2] around the local x axis.
        let inliers: Vec<Vec3> = (0..=20)
            .map(|i| {
                let angle = -FRAC_PI_2 + PI * (i as f32 / 20.0);
                Vec3::new(angle.cos(), 0.0, angle.sin())
            })
            .collect();
        let (begin, delta) = torus.calc_angle_range(&inliers);
        assert!((delta - PI).abs() < 0.05, "delta was {delta}");
        assert!(begin.abs() < FRAC_PI_2 + 0.05);
    }

    #[test]
    fn full_ring_inliers_collapse_to_full_circle() {
        let torus = Torus {
            extrinsics: Mat4::IDENTITY,
            mean_radius: 1.0,
            tube_radius: 0.1,
        };
        let inliers: Vec<Vec3> = (0..36)
            .map(|i| {
                let angle = TAU * (i as f32 / 36.0);
                Vec3::new(angle.cos(), 0.0, angle.sin())
            })
            .collect();
        assert_eq!(torus.calc_angle_range(&inliers), (0.0, TAU));
        assert_eq!(torus.calc_angle_range(&[]), (0.0, TAU));
    }
}
