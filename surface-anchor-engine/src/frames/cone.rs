//! Cone screens wrap a band of the lateral surface around the gesture.
//!
//! The band's radii follow the slant so the screen hugs the surface; when
//! the gesture lands too close to the apex for the band to fit, it slides
//! down and wraps the tip instead.

use std::f32::consts::PI;

use bevy::math::{Mat4, Vec3};

use constants::detection::{
    APEX_DEGENERACY_DISTANCE, CONE_FOOT_RATIO_MIN, PARALLEL_GAZE_ANGLE, SCREEN_ARC_FRACTION,
};

use super::{ScreenPlacement, TextureRotation, is_horizontal_axis, localized_frame};
use crate::engine::session::PoseExt;
use crate::fitting::geometry::{Cone, angle_between};

pub(super) fn place(
    cone: &Cone,
    gesture: Vec3,
    origin_from_device: Mat4,
    screen_aspect_ratio: f32,
) -> ScreenPlacement {
    let mut gesture = gesture;
    let center = cone.center();
    let axis = cone.axis();
    let top = cone.top();
    let top_bottom_distance = cone.top().distance(cone.bottom());
    let vertex = cone.vertex();

    let rotation = if is_horizontal_axis(axis) {
        let dotar = axis.dot(origin_from_device.basis_x());
        let right_angle = dotar.clamp(-1.0, 1.0).acos();
        let left_angle = (-dotar).clamp(-1.0, 1.0).acos();
        if right_angle > left_angle {
            TextureRotation::Clockwise90
        } else {
            TextureRotation::CounterClockwise90
        }
    } else if axis.y < 0.0 {
        TextureRotation::UpsideDown
    } else {
        TextureRotation::None
    };
    let aspect_ratio = match rotation {
        TextureRotation::Clockwise90 | TextureRotation::CounterClockwise90 => {
            1.0 / screen_aspect_ratio
        }
        _ => screen_aspect_ratio,
    };

    let mut foot = center + (gesture - center).dot(axis) * axis;
    let foot_ratio = (foot.distance(top) / top_bottom_distance).max(CONE_FOOT_RATIO_MIN);
    let foot_radius =
        cone.top_radius + (cone.bottom_radius - cone.top_radius) * foot_ratio;

    if foot.distance(vertex) < APEX_DEGENERACY_DISTANCE {
        // Gesture at the apex: back off along the axis and fabricate a
        // radial direction from the device basis.
        foot = top - foot_ratio * top_bottom_distance * axis;
        let reference = if angle_between(origin_from_device.basis_z(), axis) < PARALLEL_GAZE_ANGLE
        {
            origin_from_device.basis_y()
        } else {
            origin_from_device.basis_z()
        };
        let orthogonal = axis.cross(reference).normalize().cross(axis).normalize();
        gesture = foot + orthogonal * foot_radius;
    }

    let screen_width = PI * SCREEN_ARC_FRACTION * foot_radius;
    let screen_height = screen_width / aspect_ratio;
    let available_height = vertex.distance(gesture);
    let not_enough_space = screen_height * 0.5 > available_height;

    let taper = cone.bottom_radius - cone.top_radius;
    let lateral = (taper * taper + top_bottom_distance * top_bottom_distance).sqrt();
    let sin_half_angle = taper / lateral;
    let cos_half_angle = top_bottom_distance / lateral;

    let vertical_length = screen_height * cos_half_angle;
    let (position, screen_top_radius, screen_bottom_radius) = if not_enough_space {
        // Wrap the tip: the band runs down from the apex.
        (
            vertex - 0.5 * vertical_length * axis,
            0.0,
            screen_height * sin_half_angle,
        )
    } else {
        let radius_offset = screen_height * 0.5 * sin_half_angle;
        (
            foot,
            foot_radius - radius_offset,
            foot_radius + radius_offset,
        )
    };

    let x_axis = (gesture - foot).normalize();
    let y_axis = axis;
    let z_axis = x_axis.cross(y_axis).normalize();
    let frame = localized_frame(cone.world_to_local(), x_axis, y_axis, z_axis, position);
    ScreenPlacement::Cone {
        frame,
        top_radius: screen_top_radius,
        bottom_radius: screen_bottom_radius,
        length: vertical_length,
        rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic_cone() -> Cone {
        // Full cone: apex at y = 0.5, base radius 0.3 at y = -0.5.
        Cone {
            extrinsics: Mat4::IDENTITY,
            height: 1.0,
            top_radius: 0.0,
            bottom_radius: 0.3,
        }
    }

    fn device_at(position: Vec3) -> Mat4 {
        Mat4::from_translation(position)
    }

    #[test]
    fn band_wraps_the_surface_at_the_gesture_foot() {
        let cone = traffic_cone();
        // Grab the side at the base level.
        let gesture = Vec3::new(0.3, -0.5, 0.0);
        let placement = place(&cone, gesture, device_at(Vec3::new(3.0, 0.0, 0.0)), 1.0);
        let ScreenPlacement::Cone {
            frame,
            top_radius,
            bottom_radius,
            length,
            rotation,
        } = placement
        else {
            panic!("expected a cone placement, got {placement:?}");
        };
        assert_eq!(rotation, TextureRotation::None);
        // Foot sits on the axis at gesture height; the fit has room, so the
        // band is centered there with radii straddling the foot radius.
        assert!((frame.origin - Vec3::new(0.0, -0.5, 0.0)).length() < 1e-5);
        assert!((frame.x_axis - Vec3::X).length() < 1e-5);
        assert!(top_radius < 0.3 && bottom_radius > 0.3);
        assert!(length > 0.0);
    }

    #[test]
    fn apex_gesture_backs_off_along_the_axis() {
        let cone = traffic_cone();
        // Grab exactly the apex; the foot and radial direction degenerate
        // and get rebuilt from the foot ratio floor and the device basis.
        let gesture = Vec3::new(0.0, 0.5, 0.0);
        let placement = place(&cone, gesture, device_at(Vec3::new(0.0, 0.5, 3.0)), 1.0);
        let ScreenPlacement::Cone {
            frame,
            top_radius,
            bottom_radius,
            ..
        } = placement
        else {
            panic!("expected a cone placement, got {placement:?}");
        };
        // Foot slides to 20% below the apex and the radial axis comes from
        // the device's gaze basis.
        assert!((frame.origin - Vec3::new(0.0, 0.3, 0.0)).length() < 1e-5);
        assert!((frame.x_axis - Vec3::Z).length() < 1e-5);
        assert!(top_radius > 0.0 && top_radius < bottom_radius);
    }

    #[test]
    fn tall_screen_near_the_apex_wraps_the_tip() {
        let cone = traffic_cone();
        let gesture = Vec3::new(0.0, 0.5, 0.0);
        // Aspect 0.2 makes the screen five times taller than wide, which no
        // longer fits between the gesture and the apex.
        let placement = place(&cone, gesture, device_at(Vec3::new(0.0, 0.5, 3.0)), 0.2);
        let ScreenPlacement::Cone {
            frame,
            top_radius,
            bottom_radius,
            length,
            ..
        } = placement
        else {
            panic!("expected a cone placement, got {placement:?}");
        };
        assert_eq!(top_radius, 0.0);
        assert!(bottom_radius > 0.0);
        // Band hangs down from the apex by half its own length.
        assert!((frame.origin.y - (0.5 - 0.5 * length)).abs() < 1e-5);
    }

    #[test]
    fn upside_down_cone_flips_the_texture() {
        let funnel = Cone {
            extrinsics: crate::engine::session::extrinsics(
                Vec3::X,
                Vec3::NEG_Y,
                Vec3::NEG_Z,
                Vec3::ZERO,
            ),
            height: 1.0,
            top_radius: 0.05,
            bottom_radius: 0.3,
        };
        let placement = place(
            &funnel,
            Vec3::new(0.2, -0.2, 0.0),
            device_at(Vec3::new(3.0, 0.0, 0.0)),
            1.0,
        );
        let ScreenPlacement::Cone { rotation, .. } = placement else {
            panic!("expected a cone placement, got {placement:?}");
        };
        assert_eq!(rotation, TextureRotation::UpsideDown);
    }
}
