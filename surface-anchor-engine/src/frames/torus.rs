//! Torus screens bend around the ring. The texture rotation depends on
//! where on the ring the user grabbed relative to the projected world up,
//! and for lying rings on which side the axis faces the device.

use bevy::math::{Mat4, Vec3};

use constants::detection::{PARALLEL_GAZE_ANGLE, QUADRANT_FAR_DEGREES, QUADRANT_NEAR_DEGREES};

use super::{ScreenPlacement, TextureRotation, is_horizontal_axis, localized_frame};
use crate::engine::session::PoseExt;
use crate::fitting::geometry::{Torus, angle_between};

/// Which way the grab point lies on the ring, seen in world terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureWorldDirection {
    Up,
    Down,
    Right,
    Left,
}

pub(super) fn place(
    torus: &Torus,
    gesture: Vec3,
    origin_from_device: Mat4,
    begin_angle: f32,
    delta_angle: f32,
) -> ScreenPlacement {
    let center = torus.center();
    let axis = torus.axis();

    // Radial direction of the grab point around the ring.
    let p = (gesture - center).normalize();
    let l = p.cross(axis).normalize();
    let r = axis.cross(l).normalize();
    let foot = center + torus.mean_radius * r;

    // World up projected onto the ring plane; a lying ring has no such
    // projection and uses the axis itself.
    let tilt = axis.cross(Vec3::Y);
    let up = if tilt.length() > 0.0 {
        tilt.normalize().cross(axis)
    } else {
        axis
    };

    let gf = (gesture - foot).normalize();
    let gesture_angle = {
        let foot_tangent = axis.cross(r);
        let angle = angle_between(r, gf);
        if r.cross(gf).dot(foot_tangent) > 0.0 {
            angle
        } else {
            -angle
        }
    };

    let gesture_direction = {
        let unsigned = angle_between(up, r);
        let positive = unsigned < PARALLEL_GAZE_ANGLE || up.cross(r).dot(axis) > 0.0;
        let degrees = if positive { unsigned } else { -unsigned }.to_degrees();
        if (-QUADRANT_NEAR_DEGREES..QUADRANT_NEAR_DEGREES).contains(&degrees) {
            GestureWorldDirection::Up
        } else if (QUADRANT_NEAR_DEGREES..QUADRANT_FAR_DEGREES).contains(&degrees) {
            GestureWorldDirection::Right
        } else if (-QUADRANT_FAR_DEGREES..-QUADRANT_NEAR_DEGREES).contains(&degrees) {
            GestureWorldDirection::Left
        } else {
            GestureWorldDirection::Down
        }
    };

    let rotation = if is_horizontal_axis(axis) {
        // Standing ring: quadrant decides the quarter-turn, mirrored when
        // the axis faces away from the device.
        let toward_device = (origin_from_device.position() - center).normalize();
        let facing = axis.dot(toward_device) > 0.0;
        match gesture_direction {
            GestureWorldDirection::Up => {
                if facing {
                    TextureRotation::UpsideDown
                } else {
                    TextureRotation::None
                }
            }
            GestureWorldDirection::Down => {
                if facing {
                    TextureRotation::None
                } else {
                    TextureRotation::UpsideDown
                }
            }
            GestureWorldDirection::Right => {
                if facing {
                    TextureRotation::Clockwise90
                } else {
                    TextureRotation::CounterClockwise90
                }
            }
            GestureWorldDirection::Left => {
                if facing {
                    TextureRotation::CounterClockwise90
                } else {
                    TextureRotation::Clockwise90
                }
            }
        }
    } else {
        // Lying ring: grabbing the inner side reads upside down.
        let degrees = gesture_angle.to_degrees();
        if degrees > 90.0 || degrees < -90.0 {
            TextureRotation::UpsideDown
        } else {
            TextureRotation::None
        }
    };

    let x_axis = r;
    let y_axis = axis;
    let z_axis = x_axis.cross(y_axis).normalize();
    let frame = localized_frame(torus.world_to_local(), x_axis, y_axis, z_axis, center);
    ScreenPlacement::Torus {
        frame,
        mean_radius: torus.mean_radius,
        tube_radius: torus.tube_radius,
        gesture_angle,
        begin_angle,
        delta_angle,
        rotation,
    }
}
