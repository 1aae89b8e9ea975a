//! Reconstruction mesh bookkeeping.
//!
//! Each mesh anchor contributes a patch of world-space vertices and faces.
//! The store keeps patches in arrival order so the flattened seed cloud is
//! deterministic, mirrors every patch with a proxy entity, and answers the
//! gaze raycasts the detection loop runs each frame.

use std::collections::HashMap;
use std::str::FromStr;

use bevy::math::{Mat4, Vec3};
use bevy::prelude::*;

use crate::EnginePhase;
use crate::engine::boundary::{OperationalBoundary, filter_mesh};
use crate::engine::session::AnchorId;

/// One mesh anchor snapshot from the scene-reconstruction provider.
/// Vertex data is anchor-local; `origin_from_anchor` places it in the world.
#[derive(Debug, Clone)]
pub struct MeshAnchorUpdate {
    pub id: AnchorId,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Flat triangle list, three indices per face.
    pub indices: Vec<u32>,
    pub origin_from_anchor: Mat4,
}

impl MeshAnchorUpdate {
    pub fn world_positions(&self) -> Vec<Vec3> {
        self.positions
            .iter()
            .map(|position| self.origin_from_anchor.transform_point3(*position))
            .collect()
    }

    pub fn faces(&self) -> Vec<[u32; 3]> {
        self.indices
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect()
    }
}

#[derive(Event, Debug, Clone)]
pub enum MeshAnchorEvent {
    Added(MeshAnchorUpdate),
    Updated(MeshAnchorUpdate),
    Removed(AnchorId),
}

/// Marker entity mirroring one mesh anchor. The anchor identity travels as a
/// string, the way the platform names collision proxies.
#[derive(Component, Debug)]
pub struct MeshProxy {
    pub anchor: String,
}

/// A gaze ray hit on the reconstruction mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPick {
    /// Stringified anchor id of the patch that was hit.
    pub anchor: String,
    pub face_index: usize,
    pub position: Vec3,
    pub distance: f32,
}

/// World-space vertices and faces per mesh anchor, plus the running vertex
/// total across all patches.
#[derive(Resource, Debug, Default)]
pub struct MeshVertexStore {
    order: Vec<AnchorId>,
    vertices: HashMap<AnchorId, Vec<Vec3>>,
    faces: HashMap<AnchorId, Vec<[u32; 3]>>,
    proxies: HashMap<AnchorId, Entity>,
    vertex_count: usize,
}

impl MeshVertexStore {
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn anchor_count(&self) -> usize {
        self.order.len()
    }

    pub fn vertices_of(&self, id: &AnchorId) -> Option<&[Vec3]> {
        self.vertices.get(id).map(Vec::as_slice)
    }

    pub fn proxy_of(&self, id: &AnchorId) -> Option<Entity> {
        self.proxies.get(id).copied()
    }

    /// All stored vertices, concatenated in anchor arrival order.
    pub fn flattened_vertices(&self) -> Vec<Vec3> {
        let mut cloud = Vec::with_capacity(self.vertex_count);
        for id in &self.order {
            if let Some(vertices) = self.vertices.get(id) {
                cloud.extend_from_slice(vertices);
            }
        }
        cloud
    }

    /// Index of `point` in the flattened cloud, by exact component equality.
    pub fn seed_index_of(&self, point: Vec3) -> Option<usize> {
        let mut offset = 0;
        for id in &self.order {
            let Some(vertices) = self.vertices.get(id) else {
                continue;
            };
            if let Some(local) = vertices.iter().position(|vertex| *vertex == point) {
                return Some(offset + local);
            }
            offset += vertices.len();
        }
        None
    }

    fn replace(&mut self, id: AnchorId, vertices: Vec<Vec3>, faces: Vec<[u32; 3]>) {
        let previous = self.vertices.get(&id).map_or(0, Vec::len);
        self.vertex_count = self.vertex_count + vertices.len() - previous;
        if !self.vertices.contains_key(&id) {
            self.order.push(id);
        }
        self.vertices.insert(id, vertices);
        self.faces.insert(id, faces);
    }

    fn remove(&mut self, id: &AnchorId) -> Option<Entity> {
        if let Some(vertices) = self.vertices.remove(id) {
            self.vertex_count -= vertices.len();
        }
        self.faces.remove(id);
        self.order.retain(|other| other != id);
        self.proxies.remove(id)
    }

    /// Nearest hit across all patches, if the ray touches the mesh.
    pub fn raycast(&self, origin: Vec3, direction: Vec3) -> Option<SeedPick> {
        let mut best: Option<SeedPick> = None;
        for id in &self.order {
            let (Some(vertices), Some(faces)) = (self.vertices.get(id), self.faces.get(id)) else {
                continue;
            };
            for (face_index, face) in faces.iter().enumerate() {
                let [a, b, c] = [
                    vertices[face[0] as usize],
                    vertices[face[1] as usize],
                    vertices[face[2] as usize],
                ];
                let Some(t) = ray_triangle_hit(origin, direction, a, b, c) else {
                    continue;
                };
                if best.as_ref().is_none_or(|pick| t < pick.distance) {
                    best = Some(SeedPick {
                        anchor: id.to_string(),
                        face_index,
                        position: origin + direction * t,
                        distance: t,
                    });
                }
            }
        }
        best
    }

    /// The three vertices of the picked face, ordered by squared distance to
    /// the hit point (closest first). `None` when the anchor id fails to
    /// parse or the patch has gone away since the pick.
    pub fn nearest_triangle_vertices(&self, pick: &SeedPick) -> Option<(Vec3, Vec3, Vec3)> {
        let id = AnchorId::from_str(&pick.anchor).ok()?;
        let vertices = self.vertices.get(&id)?;
        let face = self.faces.get(&id)?.get(pick.face_index)?;
        let mut corners = [
            vertices[face[0] as usize],
            vertices[face[1] as usize],
            vertices[face[2] as usize],
        ];
        corners.sort_by(|a, b| {
            a.distance_squared(pick.position)
                .total_cmp(&b.distance_squared(pick.position))
        });
        Some((corners[0], corners[1], corners[2]))
    }
}

/// Möller-Trumbore, front and back faces alike. Returns the ray parameter.
fn ray_triangle_hit(origin: Vec3, direction: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let edge1 = b - a;
    let edge2 = c - a;
    let p = direction.cross(edge2);
    let determinant = edge1.dot(p);
    if determinant.abs() < 1e-7 {
        return None;
    }
    let inv_determinant = 1.0 / determinant;
    let s = origin - a;
    let u = s.dot(p) * inv_determinant;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_determinant;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_determinant;
    (t > 1e-4).then_some(t)
}

pub fn handle_mesh_anchor_events(
    mut events: EventReader<MeshAnchorEvent>,
    boundary: Res<OperationalBoundary>,
    mut store: ResMut<MeshVertexStore>,
    mut commands: Commands,
) {
    for event in events.read() {
        match event {
            MeshAnchorEvent::Added(update) | MeshAnchorEvent::Updated(update) => {
                apply_update(&mut store, &boundary, update, &mut commands);
            }
            MeshAnchorEvent::Removed(id) => {
                if let Some(proxy) = store.remove(id) {
                    commands.entity(proxy).despawn();
                }
            }
        }
    }
}

fn apply_update(
    store: &mut MeshVertexStore,
    boundary: &OperationalBoundary,
    update: &MeshAnchorUpdate,
    commands: &mut Commands,
) {
    let world = update.world_positions();
    if world.is_empty() {
        warn!("mesh anchor {} delivered an empty patch", update.id);
        if let Some(proxy) = store.remove(&update.id) {
            commands.entity(proxy).despawn();
        }
        return;
    }

    let mut min = world[0];
    let mut max = world[0];
    for position in &world[1..] {
        min = min.min(*position);
        max = max.max(*position);
    }

    let (positions, faces) = if boundary.0.contains_aabb(min, max) {
        (world, update.faces())
    } else {
        let filtered = filter_mesh(&boundary.0, &world, &update.normals, &update.faces());
        (filtered.positions, filtered.faces)
    };
    store.replace(update.id, positions, faces);

    let transform = Transform::from_matrix(update.origin_from_anchor);
    match store.proxies.get(&update.id) {
        Some(proxy) => {
            commands.entity(*proxy).insert(transform);
        }
        None => {
            let proxy = commands
                .spawn((
                    MeshProxy {
                        anchor: update.id.to_string(),
                    },
                    transform,
                ))
                .id();
            store.proxies.insert(update.id, proxy);
        }
    }
}

pub struct MeshStorePlugin;

impl Plugin for MeshStorePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeshVertexStore>()
            .init_resource::<OperationalBoundary>()
            .add_event::<MeshAnchorEvent>()
            .add_systems(
                Update,
                handle_mesh_anchor_events.in_set(EnginePhase::Mesh),
            );
    }
}
