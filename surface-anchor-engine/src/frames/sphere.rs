//! Sphere screens sit at the center and face the device, rolled to match
//! the device's up axis.

use bevy::math::Mat4;

use constants::detection::SCREEN_RADIUS_PADDING;

use super::{ScreenPlacement, localized_frame};
use crate::engine::session::PoseExt;
use crate::fitting::geometry::Sphere;

pub(super) fn place(sphere: &Sphere, origin_from_device: Mat4) -> ScreenPlacement {
    let center = sphere.center();
    let x_axis = (origin_from_device.position() - center).normalize();
    let y_axis = origin_from_device.basis_y().normalize();
    let z_axis = x_axis.cross(y_axis).normalize();
    let frame = localized_frame(sphere.world_to_local(), x_axis, y_axis, z_axis, center);
    ScreenPlacement::Sphere {
        frame,
        radius: sphere.radius + SCREEN_RADIUS_PADDING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::extrinsics;
    use bevy::math::Vec3;

    #[test]
    fn screen_faces_the_device_with_padded_radius() {
        let sphere = Sphere {
            extrinsics: extrinsics(Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(0.0, 1.0, -2.0)),
            radius: 0.3,
        };
        let device = Mat4::from_translation(Vec3::new(0.0, 1.0, 1.0));
        let placement = place(&sphere, device);
        let ScreenPlacement::Sphere { frame, radius } = placement else {
            panic!("expected a sphere placement, got {placement:?}");
        };
        assert!((radius - 0.31).abs() < 1e-6);
        // Local equals world up to the center translation here.
        assert!((frame.x_axis - Vec3::Z).length() < 1e-5);
        assert!((frame.y_axis - Vec3::Y).length() < 1e-5);
        assert!((frame.z_axis - Vec3::Z.cross(Vec3::Y)).length() < 1e-5);
        assert!(frame.origin.length() < 1e-5);
    }
}
