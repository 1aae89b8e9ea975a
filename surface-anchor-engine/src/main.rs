//! Headless demo: feeds a synthetic floor patch and a downward gaze through
//! the engine, commits the detected plane and prints what got anchored.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use bevy::app::App;
use bevy::log::{LogPlugin, info};
use bevy::math::{Mat4, Quat, Vec3};
use bevy::prelude::*;

use surface_anchor_engine::SurfaceAnchorPlugin;
use surface_anchor_engine::engine::mesh::{MeshAnchorEvent, MeshAnchorUpdate, MeshVertexStore};
use surface_anchor_engine::engine::session::{
    AnchorId, AnchorRegistry, LocalAnchorProvider, SessionPlugin,
};
use surface_anchor_engine::fitting::geometry::Plane;
use surface_anchor_engine::fitting::orchestrator::{FindSurfaceConfig, FitEngine};
use surface_anchor_engine::fitting::scripted::ScriptedEngine;
use surface_anchor_engine::fitting::telemetry::FoundTimer;
use surface_anchor_engine::fitting::FitResult;
use surface_anchor_engine::objects::media::{MediaKind, MediaLibrary, MediaRecord};
use surface_anchor_engine::objects::store::PersistentStore;
use surface_anchor_engine::objects::tracker::ObjectTracker;

fn floor_patch() -> MeshAnchorUpdate {
    let positions = vec![
        Vec3::new(-1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, 1.0),
        Vec3::new(-1.0, 0.0, 1.0),
    ];
    MeshAnchorUpdate {
        id: AnchorId::new(),
        normals: vec![Vec3::Y; positions.len()],
        positions,
        indices: vec![0, 1, 2, 0, 2, 3],
        origin_from_anchor: Mat4::IDENTITY,
    }
}

fn floor_fit() -> FitResult {
    FitResult::Plane {
        plane: Plane {
            extrinsics: Mat4::IDENTITY,
            width: 2.0,
            height: 2.0,
        },
        inliers: vec![Vec3::ZERO, Vec3::new(0.5, 0.0, 0.5)],
        rms_error: 0.003,
    }
}

fn main() {
    let (feeds, session) = SessionPlugin::channels();

    let mut app = App::new();
    app.add_plugins((MinimalPlugins, LogPlugin::default()))
        .add_plugins((session, SurfaceAnchorPlugin));

    app.insert_resource(AnchorRegistry(Arc::new(LocalAnchorProvider::new(
        feeds.world.clone(),
    ))));
    let engine = Arc::new(ScriptedEngine::new());
    engine.push(floor_fit());
    app.insert_resource(FitEngine(engine.clone()));

    let mut media = MediaLibrary::default();
    media.insert(MediaRecord {
        id: "demo.png".into(),
        kind: MediaKind::Photo,
        aspect_ratio: 16.0 / 9.0,
    });
    app.insert_resource(media);

    // Device 1.5 m up, gazing straight down at the patch.
    let _ = feeds.device.send(Mat4::from_rotation_translation(
        Quat::from_rotation_x(-FRAC_PI_2),
        Vec3::new(0.0, 1.5, 0.0),
    ));
    let _ = feeds.mesh.send(MeshAnchorEvent::Added(floor_patch()));

    app.world_mut().resource_mut::<FindSurfaceConfig>().enabled = true;
    app.update();

    {
        let store = app.world().resource::<MeshVertexStore>();
        let timer = app.world().resource::<FoundTimer>();
        info!(
            "after one tick: {} mesh vertices, found rate {:.2}",
            store.vertex_count(),
            timer.found_rate()
        );
    }

    // Confirm the next detection.
    engine.push(floor_fit());
    app.world_mut()
        .resource_mut::<FindSurfaceConfig>()
        .take_next_as_result = true;

    // One update to commit, one for the anchor round trip to spawn.
    app.update();
    app.update();

    let tracker = app.world().resource::<ObjectTracker>();
    let store = app.world().resource::<PersistentStore>();
    info!(
        "{} screen(s) anchored after {} engine invocation(s)",
        tracker.committed_count(),
        engine.invocations()
    );
    for object in store.0.objects() {
        info!(
            "  {} -> {} (rms {:.4})",
            object.name, object.media_id, object.rms_error
        );
    }
}
