//! Cylinder screens wrap the surface at the gesture's foot on the axis.
//! Near-horizontal cylinders re-sign their axis toward the device's right so
//! the texture never reads sideways-down.

use bevy::math::{Mat4, Vec3};

use constants::detection::SCREEN_RADIUS_PADDING;

use super::{ScreenPlacement, is_horizontal_axis, localized_frame};
use crate::engine::session::PoseExt;
use crate::fitting::geometry::{Cylinder, angle_between};

pub(super) fn place(
    cylinder: &Cylinder,
    gesture: Vec3,
    origin_from_device: Mat4,
) -> ScreenPlacement {
    let center = cylinder.center();
    let axis = cylinder.axis();

    let device_right = origin_from_device.basis_x();
    let dotar = axis.dot(device_right);
    let right_angle = angle_between(axis, device_right);
    let left_angle = (-dotar).clamp(-1.0, 1.0).acos();
    let axis = if is_horizontal_axis(axis) && right_angle > left_angle {
        -axis
    } else {
        axis
    };

    let foot = center + (gesture - center).dot(axis) * axis;
    let x_axis = (gesture - foot).normalize();
    let y_axis = axis;
    let z_axis = x_axis.cross(y_axis).normalize();
    let frame = localized_frame(cylinder.world_to_local(), x_axis, y_axis, z_axis, foot);
    ScreenPlacement::Cylinder {
        frame,
        radius: cylinder.radius + SCREEN_RADIUS_PADDING,
    }
}
