//! Plane screens: ceilings and floors face straight up/down with the
//! forward axis taken from the gaze (or the device's own up axis when the
//! gaze is parallel to the normal); walls hang upright against gravity.

use bevy::math::{Mat4, Vec3};

use constants::detection::{HORIZONTAL_PLANE_ANGLE, PARALLEL_GAZE_ANGLE};

use super::{ReferenceFrame, ScreenPlacement, localized_frame};
use crate::engine::session::PoseExt;
use crate::fitting::geometry::Plane;

pub(super) fn place(plane: &Plane, gesture: Vec3, origin_from_device: Mat4) -> ScreenPlacement {
    let normal = plane.normal();
    let world_to_local = plane.world_to_local();

    if (-normal.y).clamp(-1.0, 1.0).acos() < HORIZONTAL_PLANE_ANGLE {
        let frame = horizontal_frame(
            world_to_local,
            -normal,
            normal,
            gesture,
            origin_from_device,
            origin_from_device.basis_y(),
        );
        ScreenPlacement::Ceiling { frame }
    } else if normal.y.clamp(-1.0, 1.0).acos() < HORIZONTAL_PLANE_ANGLE {
        let frame = horizontal_frame(
            world_to_local,
            normal,
            normal,
            gesture,
            origin_from_device,
            -origin_from_device.basis_y(),
        );
        ScreenPlacement::Floor { frame }
    } else {
        let up = Vec3::Y;
        let y_axis = (up - up.dot(normal) * normal).normalize();
        let x_axis = y_axis.cross(normal).normalize();
        let frame = localized_frame(world_to_local, x_axis, y_axis, normal, gesture);
        ScreenPlacement::Wall { frame }
    }
}

/// Shared ceiling/floor frame: forward along the gaze projected into the
/// plane, falling back to the device's up axis when the gaze runs along the
/// normal.
fn horizontal_frame(
    world_to_local: Mat4,
    y_axis: Vec3,
    normal: Vec3,
    gesture: Vec3,
    origin_from_device: Mat4,
    parallel_fallback: Vec3,
) -> ReferenceFrame {
    let toward_device = (origin_from_device.position() - gesture).normalize();
    let dotdn = toward_device.dot(normal);
    let cos_parallel = PARALLEL_GAZE_ANGLE.cos();
    let is_parallel = dotdn > cos_parallel || dotdn < -cos_parallel;
    let z_axis = if is_parallel {
        parallel_fallback
    } else {
        (toward_device - dotdn * normal).normalize()
    };
    let x_axis = y_axis.cross(z_axis).normalize();
    localized_frame(world_to_local, x_axis, y_axis, z_axis, gesture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::extrinsics;
    use bevy::math::Quat;

    fn floor_plane() -> Plane {
        Plane {
            extrinsics: extrinsics(Vec3::X, Vec3::Y, Vec3::Z, Vec3::ZERO),
            width: 2.0,
            height: 2.0,
        }
    }

    fn device_at(position: Vec3) -> Mat4 {
        Mat4::from_translation(position)
    }

    #[test]
    fn upward_normal_classifies_as_floor() {
        // Device standing off to the side, gazing down at the gesture point.
        let placement = place(
            &floor_plane(),
            Vec3::new(0.5, 0.0, 0.0),
            device_at(Vec3::new(0.0, 1.5, 2.0)),
        );
        let ScreenPlacement::Floor { frame } = placement else {
            panic!("expected a floor placement, got {placement:?}");
        };
        // Frame is plane-local; the floor plane sits at identity so local
        // equals world. Screen up matches the normal.
        assert!((frame.y_axis - Vec3::Y).length() < 1e-5);
        assert!((frame.origin - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-5);
        // Forward is the horizontal part of the device direction.
        assert!(frame.z_axis.y.abs() < 1e-5);
        assert!(frame.z_axis.z > 0.9);
    }

    #[test]
    fn downward_normal_classifies_as_ceiling() {
        let plane = Plane {
            extrinsics: extrinsics(Vec3::X, Vec3::NEG_Y, Vec3::NEG_Z, Vec3::new(0.0, 2.5, 0.0)),
            width: 2.0,
            height: 2.0,
        };
        let placement = place(
            &plane,
            Vec3::new(0.0, 2.5, -1.0),
            device_at(Vec3::new(0.0, 1.5, 0.0)),
        );
        assert!(matches!(placement, ScreenPlacement::Ceiling { .. }));
    }

    #[test]
    fn wall_screen_hangs_upright() {
        let plane = Plane {
            extrinsics: extrinsics(Vec3::NEG_X, Vec3::Z, Vec3::Y, Vec3::new(0.0, 1.0, -2.0)),
            width: 2.0,
            height: 2.0,
        };
        let placement = place(
            &plane,
            Vec3::new(0.2, 1.2, -2.0),
            device_at(Vec3::new(0.0, 1.5, 1.0)),
        );
        let ScreenPlacement::Wall { frame } = placement else {
            panic!("expected a wall placement, got {placement:?}");
        };
        // In world space the frame's y axis must be the upright direction
        // projected into the wall, which here is world up.
        let world = frame.world_matrix(plane.extrinsics);
        assert!((world.basis_y() - Vec3::Y).length() < 1e-5);
        assert!((world.basis_z() - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn parallel_gaze_falls_back_to_device_up() {
        // Device directly above the gesture point, head pitched to gaze
        // straight down, so its up axis lies horizontal.
        let device = Mat4::from_rotation_translation(
            Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            Vec3::new(0.0, 1.5, 0.0),
        );
        let placement = place(&floor_plane(), Vec3::ZERO, device);
        let ScreenPlacement::Floor { frame } = placement else {
            panic!("expected a floor placement, got {placement:?}");
        };
        // Fallback forward is the negated device up axis.
        assert!((frame.z_axis - device.basis_y() * -1.0).length() < 1e-5);
        assert!(frame.z_axis.y.abs() < 1e-5);
    }
}
