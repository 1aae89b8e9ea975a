//! Screen placement: deriving, for each fitted primitive, the local
//! reference frame a virtual screen hangs off and how its texture is
//! oriented.
//!
//! Frames are stored relative to the primitive's extrinsics so they survive
//! world-anchor drift; composing with the live anchor matrix yields the
//! world pose.

use bevy::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::engine::session::{PoseExt, extrinsics};
use crate::objects::Geometry;

mod cone;
mod cylinder;
mod plane;
mod sphere;
mod torus;

/// Right-handed basis plus origin, stored primitive-local.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFrame {
    #[serde(with = "crate::codec::vec3")]
    pub x_axis: Vec3,
    #[serde(with = "crate::codec::vec3")]
    pub y_axis: Vec3,
    #[serde(with = "crate::codec::vec3")]
    pub z_axis: Vec3,
    #[serde(with = "crate::codec::vec3")]
    pub origin: Vec3,
}

impl ReferenceFrame {
    pub fn new(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3, origin: Vec3) -> Self {
        ReferenceFrame {
            x_axis,
            y_axis,
            z_axis,
            origin,
        }
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        ReferenceFrame {
            x_axis: matrix.basis_x(),
            y_axis: matrix.basis_y(),
            z_axis: matrix.basis_z(),
            origin: matrix.position(),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        extrinsics(self.x_axis, self.y_axis, self.z_axis, self.origin)
    }

    /// World pose of the frame under the given anchor matrix.
    pub fn world_matrix(&self, origin_from_anchor: Mat4) -> Mat4 {
        origin_from_anchor * self.matrix()
    }
}

/// Quarter-turn applied to the screen texture so it reads upright from the
/// user's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureRotation {
    #[default]
    None,
    Clockwise90,
    CounterClockwise90,
    UpsideDown,
}

/// Per-primitive screen placement, all geometry primitive-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScreenPlacement {
    Ceiling {
        frame: ReferenceFrame,
    },
    Floor {
        frame: ReferenceFrame,
    },
    Wall {
        frame: ReferenceFrame,
    },
    Sphere {
        frame: ReferenceFrame,
        radius: f32,
    },
    Cylinder {
        frame: ReferenceFrame,
        radius: f32,
    },
    Cone {
        frame: ReferenceFrame,
        /// Radii and vertical extent of the wrapped screen band.
        top_radius: f32,
        bottom_radius: f32,
        length: f32,
        rotation: TextureRotation,
    },
    Torus {
        frame: ReferenceFrame,
        mean_radius: f32,
        tube_radius: f32,
        /// Where on the ring the user grabbed, signed from the frame x axis.
        gesture_angle: f32,
        begin_angle: f32,
        delta_angle: f32,
        rotation: TextureRotation,
    },
}

impl ScreenPlacement {
    pub fn frame(&self) -> &ReferenceFrame {
        match self {
            ScreenPlacement::Ceiling { frame }
            | ScreenPlacement::Floor { frame }
            | ScreenPlacement::Wall { frame }
            | ScreenPlacement::Sphere { frame, .. }
            | ScreenPlacement::Cylinder { frame, .. }
            | ScreenPlacement::Cone { frame, .. }
            | ScreenPlacement::Torus { frame, .. } => frame,
        }
    }

    /// Placements whose screens idle-animate (spin slowly in place).
    pub fn animates(&self) -> bool {
        matches!(
            self,
            ScreenPlacement::Sphere { .. }
                | ScreenPlacement::Cylinder { .. }
                | ScreenPlacement::Cone { .. }
        )
    }
}

/// Derives the screen placement for a committed detection, from where the
/// user was and what they grabbed.
pub fn derive_placement(
    geometry: &Geometry,
    gesture: Vec3,
    origin_from_device: Mat4,
    screen_aspect_ratio: f32,
) -> ScreenPlacement {
    match geometry {
        Geometry::Plane(plane) => plane::place(plane, gesture, origin_from_device),
        Geometry::Sphere(sphere) => sphere::place(sphere, origin_from_device),
        Geometry::Cylinder(cylinder) => cylinder::place(cylinder, gesture, origin_from_device),
        Geometry::Cone(cone) => {
            cone::place(cone, gesture, origin_from_device, screen_aspect_ratio)
        }
        Geometry::Torus {
            torus,
            begin_angle,
            delta_angle,
        } => torus::place(torus, gesture, origin_from_device, *begin_angle, *delta_angle),
    }
}

/// Rebases a world-space frame into a primitive's local space.
pub(crate) fn localized_frame(
    world_to_local: Mat4,
    x_axis: Vec3,
    y_axis: Vec3,
    z_axis: Vec3,
    origin: Vec3,
) -> ReferenceFrame {
    ReferenceFrame::new(
        world_to_local.transform_vector3(x_axis),
        world_to_local.transform_vector3(y_axis),
        world_to_local.transform_vector3(z_axis),
        world_to_local.transform_point3(origin),
    )
}

/// True when the axis leans far enough from vertical to read as horizontal.
pub(crate) fn is_horizontal_axis(axis: Vec3) -> bool {
    use constants::detection::{HORIZONTAL_AXIS_MAX_DEGREES, HORIZONTAL_AXIS_MIN_DEGREES};
    let degrees = crate::fitting::geometry::angle_between(axis, Vec3::Y).to_degrees();
    HORIZONTAL_AXIS_MIN_DEGREES < degrees && degrees < HORIZONTAL_AXIS_MAX_DEGREES
}
