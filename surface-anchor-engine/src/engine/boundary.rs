//! Operational boundary culling.
//!
//! Everything the detection loop sees is limited to a configurable volume
//! around the session origin. Mesh updates are filtered against it before
//! they reach the vertex store, so far-away reconstruction never inflates
//! the seed cloud.

use bevy::math::Vec3;
use bevy::prelude::Resource;
use rayon::prelude::*;

use constants::boundary::{BOUNDARY_FLOOR_MARGIN, DEFAULT_BOUNDARY_HEIGHT, DEFAULT_BOUNDARY_RADIUS};

/// Vertical cylinder centered on the session origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderBoundary {
    pub radius: f32,
    pub height: f32,
}

impl CylinderBoundary {
    fn contains(&self, point: Vec3) -> bool {
        BOUNDARY_FLOOR_MARGIN <= point.y
            && point.y <= self.height
            && Vec3::new(point.x, 0.0, point.z).length_squared() <= self.radius * self.radius
    }
}

/// Axis-aligned box boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBoundary {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoxBoundary {
    fn contains(&self, point: Vec3) -> bool {
        self.min.x <= point.x
            && point.x <= self.max.x
            && self.min.y <= point.y
            && point.y <= self.max.y
            && self.min.z <= point.z
            && point.z <= self.max.z
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneBoundary {
    Cylinder(CylinderBoundary),
    Box(BoxBoundary),
}

impl SceneBoundary {
    pub fn contains(&self, point: Vec3) -> bool {
        match self {
            SceneBoundary::Cylinder(cylinder) => cylinder.contains(point),
            SceneBoundary::Box(aabb) => aabb.contains(point),
        }
    }

    /// Indices of the contained points, preserving input order.
    pub fn contained_indices(&self, points: &[Vec3]) -> Vec<usize> {
        points
            .par_iter()
            .enumerate()
            .filter(|(_, point)| self.contains(**point))
            .map(|(index, _)| index)
            .collect()
    }

    /// True when every corner of the AABB lies inside the boundary, in which
    /// case a mesh patch can be kept without per-vertex filtering.
    pub fn contains_aabb(&self, min: Vec3, max: Vec3) -> bool {
        aabb_corners(min, max)
            .iter()
            .all(|corner| self.contains(*corner))
    }
}

impl Default for SceneBoundary {
    fn default() -> Self {
        SceneBoundary::Cylinder(CylinderBoundary {
            radius: DEFAULT_BOUNDARY_RADIUS,
            height: DEFAULT_BOUNDARY_HEIGHT,
        })
    }
}

/// The boundary active for the current session.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct OperationalBoundary(pub SceneBoundary);

pub fn aabb_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

/// A mesh patch reduced to the vertices inside the boundary, with faces
/// re-indexed densely.
#[derive(Debug, Clone, Default)]
pub struct FilteredMesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<[u32; 3]>,
}

/// Drops vertices outside the boundary and every face touching one, then
/// remaps the surviving face indices onto the compacted vertex list.
pub fn filter_mesh(
    boundary: &SceneBoundary,
    positions: &[Vec3],
    normals: &[Vec3],
    faces: &[[u32; 3]],
) -> FilteredMesh {
    let kept = boundary.contained_indices(positions);
    let mut remap = vec![None::<u32>; positions.len()];
    let mut filtered = FilteredMesh {
        positions: Vec::with_capacity(kept.len()),
        normals: Vec::with_capacity(kept.len()),
        faces: Vec::new(),
    };
    for (new_index, old_index) in kept.iter().copied().enumerate() {
        remap[old_index] = Some(new_index as u32);
        filtered.positions.push(positions[old_index]);
        if let Some(normal) = normals.get(old_index) {
            filtered.normals.push(*normal);
        }
    }
    for face in faces {
        let mapped = [
            remap[face[0] as usize],
            remap[face[1] as usize],
            remap[face[2] as usize],
        ];
        if let [Some(a), Some(b), Some(c)] = mapped {
            filtered.faces.push([a, b, c]);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> SceneBoundary {
        SceneBoundary::Box(BoxBoundary {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        })
    }

    #[test]
    fn cylinder_keeps_floor_margin() {
        let boundary = SceneBoundary::default();
        assert!(boundary.contains(Vec3::new(0.0, -0.05, 0.0)));
        assert!(!boundary.contains(Vec3::new(0.0, -0.2, 0.0)));
        assert!(boundary.contains(Vec3::new(4.9, 1.0, 0.0)));
        assert!(!boundary.contains(Vec3::new(5.1, 1.0, 0.0)));
        assert!(!boundary.contains(Vec3::new(0.0, 3.5, 0.0)));
    }

    #[test]
    fn contained_indices_preserve_order() {
        let boundary = unit_box();
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.9, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        ];
        assert_eq!(boundary.contained_indices(&points), vec![0, 2, 3]);
    }

    #[test]
    fn filter_is_idempotent() {
        let boundary = unit_box();
        let positions = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.0),
        ];
        let normals = vec![Vec3::Y; positions.len()];
        let faces = vec![[0, 1, 3], [1, 2, 3]];

        let once = filter_mesh(&boundary, &positions, &normals, &faces);
        assert_eq!(once.positions.len(), 3);
        assert_eq!(once.faces, vec![[0, 1, 2]]);

        let twice = filter_mesh(&boundary, &once.positions, &once.normals, &once.faces);
        assert_eq!(twice.positions, once.positions);
        assert_eq!(twice.faces, once.faces);
    }

    #[test]
    fn aabb_shortcut_matches_per_vertex_result() {
        let boundary = unit_box();
        assert!(boundary.contains_aabb(Vec3::splat(-0.5), Vec3::splat(0.5)));
        assert!(!boundary.contains_aabb(Vec3::splat(-0.5), Vec3::new(0.5, 1.5, 0.5)));
    }
}
