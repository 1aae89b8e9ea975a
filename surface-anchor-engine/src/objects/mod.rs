//! Anchored screen objects: the data committed detections turn into, their
//! persistence and their entity lifecycle.

use std::f32::consts::TAU;

use bevy::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use constants::detection::FULL_RING_DELTA_ANGLE;

use crate::engine::session::AnchorId;
use crate::fitting::FitResult;
use crate::fitting::geometry::{Cone, Cylinder, Plane, Sphere, Torus};
use crate::frames::{ScreenPlacement, derive_placement};

pub mod media;
pub mod store;
pub mod tracker;

/// The fitted primitive an object was committed from. Tori carry the
/// angular extent their inliers covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Plane(Plane),
    Sphere(Sphere),
    Cylinder(Cylinder),
    Cone(Cone),
    Torus {
        torus: Torus,
        begin_angle: f32,
        delta_angle: f32,
    },
}

impl Geometry {
    pub fn extrinsics(&self) -> Mat4 {
        match self {
            Geometry::Plane(plane) => plane.extrinsics,
            Geometry::Sphere(sphere) => sphere.extrinsics,
            Geometry::Cylinder(cylinder) => cylinder.extrinsics,
            Geometry::Cone(cone) => cone.extrinsics,
            Geometry::Torus { torus, .. } => torus.extrinsics,
        }
    }

    pub fn set_extrinsics(&mut self, extrinsics: Mat4) {
        match self {
            Geometry::Plane(plane) => plane.extrinsics = extrinsics,
            Geometry::Sphere(sphere) => sphere.extrinsics = extrinsics,
            Geometry::Cylinder(cylinder) => cylinder.extrinsics = extrinsics,
            Geometry::Cone(cone) => cone.extrinsics = extrinsics,
            Geometry::Torus { torus, .. } => torus.extrinsics = extrinsics,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Plane(_) => "Plane",
            Geometry::Sphere(_) => "Sphere",
            Geometry::Cylinder(_) => "Cylinder",
            Geometry::Cone(_) => "Cone",
            Geometry::Torus { .. } => "Torus",
        }
    }
}

/// A confirmed detection waiting for its world anchor to come back from the
/// platform.
#[derive(Debug, Clone)]
pub struct PendingObject {
    pub name: String,
    pub geometry: Geometry,
    /// Inlier points in the primitive's local frame.
    pub inliers: Vec<Vec3>,
    pub rms_error: f32,
    pub media_id: String,
    pub gesture_position: Vec3,
    pub origin_from_device: Mat4,
}

impl PendingObject {
    /// Wraps an aligned, localized fit result. `ordinal` numbers the name
    /// across pending and persisted objects. Returns `None` for a miss.
    pub fn from_result(
        result: FitResult,
        ordinal: usize,
        media_id: String,
        gesture_position: Vec3,
        origin_from_device: Mat4,
    ) -> Option<Self> {
        let (geometry, inliers, rms_error) = match result {
            FitResult::Plane {
                plane,
                inliers,
                rms_error,
            } => (Geometry::Plane(plane), inliers, rms_error),
            FitResult::Sphere {
                sphere,
                inliers,
                rms_error,
            } => (Geometry::Sphere(sphere), inliers, rms_error),
            FitResult::Cylinder {
                cylinder,
                inliers,
                rms_error,
            } => (Geometry::Cylinder(cylinder), inliers, rms_error),
            FitResult::Cone {
                cone,
                inliers,
                rms_error,
            } => (Geometry::Cone(cone), inliers, rms_error),
            FitResult::Torus {
                torus,
                inliers,
                rms_error,
            } => {
                let (mut begin_angle, mut delta_angle) = torus.calc_angle_range(&inliers);
                if delta_angle > FULL_RING_DELTA_ANGLE {
                    begin_angle = 0.0;
                    delta_angle = TAU;
                }
                (
                    Geometry::Torus {
                        torus,
                        begin_angle,
                        delta_angle,
                    },
                    inliers,
                    rms_error,
                )
            }
            FitResult::None => return None,
        };
        let name = format!("{}{}", geometry.kind_name(), ordinal);
        Some(PendingObject {
            name,
            geometry,
            inliers,
            rms_error,
            media_id,
            gesture_position,
            origin_from_device,
        })
    }
}

/// A committed object as written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedObject {
    pub id: AnchorId,
    pub name: String,
    pub geometry: Geometry,
    #[serde(with = "crate::codec::vec3_seq")]
    pub inliers: Vec<Vec3>,
    pub rms_error: f32,
    pub media_id: String,
    pub placement: ScreenPlacement,
}

impl PersistedObject {
    /// Finalizes a pending object once its anchor exists, deriving the
    /// screen placement from the viewing conditions at commit time.
    pub fn from_pending(pending: PendingObject, id: AnchorId, screen_aspect_ratio: f32) -> Self {
        let placement = derive_placement(
            &pending.geometry,
            pending.gesture_position,
            pending.origin_from_device,
            screen_aspect_ratio,
        );
        PersistedObject {
            id,
            name: pending.name,
            geometry: pending.geometry,
            inliers: pending.inliers,
            rms_error: pending.rms_error,
            media_id: pending.media_id,
            placement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_result() -> FitResult {
        FitResult::Plane {
            plane: Plane {
                extrinsics: Mat4::IDENTITY,
                width: 1.0,
                height: 1.0,
            },
            inliers: vec![Vec3::ZERO],
            rms_error: 0.002,
        }
    }

    #[test]
    fn names_number_across_kinds() {
        let pending = PendingObject::from_result(
            plane_result(),
            3,
            "demo.png".into(),
            Vec3::ZERO,
            Mat4::IDENTITY,
        )
        .unwrap();
        assert_eq!(pending.name, "Plane3");
    }

    #[test]
    fn miss_produces_no_pending_object() {
        assert!(
            PendingObject::from_result(
                FitResult::None,
                0,
                "demo.png".into(),
                Vec3::ZERO,
                Mat4::IDENTITY,
            )
            .is_none()
        );
    }

    #[test]
    fn wide_torus_arc_collapses_to_a_full_ring() {
        let inliers: Vec<Vec3> = (0..32)
            .map(|i| {
                // 1.75 pi worth of ring, beyond the full-ring threshold.
                let angle = 1.75 * std::f32::consts::PI * (i as f32 / 31.0);
                Vec3::new(angle.cos(), 0.0, angle.sin())
            })
            .collect();
        let result = FitResult::Torus {
            torus: Torus {
                extrinsics: Mat4::IDENTITY,
                mean_radius: 1.0,
                tube_radius: 0.1,
            },
            inliers,
            rms_error: 0.003,
        };
        let pending =
            PendingObject::from_result(result, 0, "demo.png".into(), Vec3::X, Mat4::IDENTITY)
                .unwrap();
        let Geometry::Torus {
            begin_angle,
            delta_angle,
            ..
        } = pending.geometry
        else {
            panic!("expected torus geometry");
        };
        assert_eq!(begin_angle, 0.0);
        assert_eq!(delta_angle, TAU);
    }

    #[test]
    fn persisted_object_carries_a_placement() {
        let pending = PendingObject::from_result(
            plane_result(),
            0,
            "demo.png".into(),
            Vec3::new(0.5, 0.0, 0.0),
            Mat4::from_translation(Vec3::new(0.0, 1.5, 2.0)),
        )
        .unwrap();
        let object = PersistedObject::from_pending(pending, AnchorId::new(), 16.0 / 9.0);
        assert!(matches!(object.placement, ScreenPlacement::Floor { .. }));
        assert_eq!(object.name, "Plane0");
    }
}
