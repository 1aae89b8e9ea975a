//! Headless engine for anchoring virtual screens onto geometric primitives
//! detected on scene-reconstruction meshes.
//!
//! The AR platform (tracking, scene reconstruction, world anchors) and the
//! proprietary FindSurface fitting engine are external collaborators reached
//! through channels and traits; this crate owns the mesh bookkeeping, seed
//! picking, fit orchestration, reference-frame derivation and the anchored
//! object lifecycle.

use bevy::prelude::*;

pub mod codec;
pub mod engine;
pub mod fitting;
pub mod frames;
pub mod objects;

/// Coarse ordering of the engine's per-frame work: provider ingest, mesh
/// reconciliation, detection, then object lifecycle.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnginePhase {
    Ingest,
    Mesh,
    Detect,
    Objects,
}

/// Umbrella plugin wiring the mesh store, the detection loop and the object
/// tracker in phase order. The session plugin is added separately because it
/// is constructed together with its provider channels, see
/// [`engine::session::SessionPlugin::channels`].
pub struct SurfaceAnchorPlugin;

impl Plugin for SurfaceAnchorPlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                EnginePhase::Ingest,
                EnginePhase::Mesh,
                EnginePhase::Detect,
                EnginePhase::Objects,
            )
                .chain(),
        );
        app.add_plugins((
            engine::mesh::MeshStorePlugin,
            fitting::orchestrator::DetectionPlugin,
            objects::tracker::ObjectTrackerPlugin,
        ));
    }
}
