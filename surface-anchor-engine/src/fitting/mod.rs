//! Surface detection: the fitting-engine interface, the per-frame
//! orchestration around it and the post-processing applied to its output.

use bevy::math::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod cache;
pub mod geometry;
pub mod orchestrator;
pub mod scripted;
pub mod telemetry;

use geometry::{Cone, Cylinder, Plane, Sphere, Torus};

/// Primitive class the engine is asked to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Plane,
    Sphere,
    Cylinder,
    Cone,
    Torus,
}

/// Degenerate-case conversions the engine may apply: a cone or torus whose
/// curvature vanishes can come back as a cylinder or sphere instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub cone_to_cylinder: bool,
    pub torus_to_cylinder: bool,
    pub torus_to_sphere: bool,
}

/// Tuning for one engine invocation. Distances are meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub target: FeatureType,
    /// A-priori measurement accuracy of the point cloud.
    pub accuracy: f32,
    /// Mean distance between neighboring points.
    pub mean_distance: f32,
    /// Radius around the seed point assumed to lie on the surface.
    pub seed_radius: f32,
    /// Lateral extension search level, 0 (off) to 10.
    pub lateral_extension: u8,
    /// Radial expansion search level, 0 (off) to 10.
    pub radial_expansion: u8,
    pub conversions: ConversionOptions,
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            target: FeatureType::Plane,
            accuracy: 0.015,
            mean_distance: 0.05,
            seed_radius: 0.15,
            lateral_extension: 5,
            radial_expansion: 5,
            conversions: ConversionOptions::default(),
        }
    }
}

/// Outcome of one engine invocation. Geometry is in world space as returned;
/// [`FitResult::align_and_localize`] canonicalizes orientation and rebases
/// the inliers into the primitive's local frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FitResult {
    Plane {
        plane: Plane,
        inliers: Vec<Vec3>,
        rms_error: f32,
    },
    Sphere {
        sphere: Sphere,
        inliers: Vec<Vec3>,
        rms_error: f32,
    },
    Cylinder {
        cylinder: Cylinder,
        inliers: Vec<Vec3>,
        rms_error: f32,
    },
    Cone {
        cone: Cone,
        inliers: Vec<Vec3>,
        rms_error: f32,
    },
    Torus {
        torus: Torus,
        inliers: Vec<Vec3>,
        rms_error: f32,
    },
    None,
}

impl FitResult {
    pub fn is_none(&self) -> bool {
        matches!(self, FitResult::None)
    }

    pub fn extrinsics(&self) -> Option<Mat4> {
        match self {
            FitResult::Plane { plane, .. } => Some(plane.extrinsics),
            FitResult::Sphere { sphere, .. } => Some(sphere.extrinsics),
            FitResult::Cylinder { cylinder, .. } => Some(cylinder.extrinsics),
            FitResult::Cone { cone, .. } => Some(cone.extrinsics),
            FitResult::Torus { torus, .. } => Some(torus.extrinsics),
            FitResult::None => None,
        }
    }

    /// Canonicalizes the fitted geometry against the viewer and maps the
    /// inliers into its local frame, so they stay valid however the world
    /// anchor drifts later.
    pub fn align_and_localize(
        &mut self,
        gesture: Vec3,
        device_position: Vec3,
        enable_full_cone_conversion: bool,
        full_cone_radii_ratio: f32,
    ) {
        match self {
            FitResult::Plane { plane, inliers, .. } => {
                plane.align(gesture, device_position);
                localize(inliers, plane.world_to_local());
            }
            FitResult::Sphere { sphere, inliers, .. } => {
                localize(inliers, sphere.world_to_local());
            }
            FitResult::Cylinder {
                cylinder, inliers, ..
            } => {
                *cylinder = cylinder.aligned();
                localize(inliers, cylinder.world_to_local());
            }
            FitResult::Cone { cone, inliers, .. } => {
                if enable_full_cone_conversion
                    && cone.top_radius / cone.bottom_radius <= full_cone_radii_ratio
                {
                    *cone = cone.extended_to_apex();
                }
                localize(inliers, cone.world_to_local());
            }
            FitResult::Torus { torus, inliers, .. } => {
                *torus = torus.aligned();
                localize(inliers, torus.world_to_local());
            }
            FitResult::None => {}
        }
    }
}

fn localize(points: &mut [Vec3], world_to_local: Mat4) {
    for point in points {
        *point = world_to_local.transform_point3(*point);
    }
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("seed index {index} out of range for {count} points")]
    SeedOutOfRange { index: usize, count: usize },
    #[error("fitting engine failure: {0}")]
    Engine(String),
}

/// The surface fitting engine. Implementations must be callable from any
/// thread; the orchestrator serializes invocations through a gate.
pub trait FindSurfaceEngine: Send + Sync {
    fn perform(
        &self,
        points: &[Vec3],
        seed_index: usize,
        params: &FitParams,
    ) -> Result<FitResult, FitError>;
}
