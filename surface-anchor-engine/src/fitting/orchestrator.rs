//! The per-frame detection loop.
//!
//! Every tick a ray is cast from the device along its gaze into the
//! reconstruction mesh. A hit highlights the picked triangle and, while
//! detection is enabled, queues a fit request seeded at the triangle vertex
//! closest to the hit. Requests are drained in arrival order through a gate
//! that keeps engine invocations strictly sequential; results are aligned,
//! cached and either previewed or committed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use bevy::math::{Mat4, Vec3};
use bevy::prelude::*;
use crossbeam::channel::{Receiver, Sender, unbounded};

use constants::detection::{FULL_CONE_RADII_RATIO, PICKING_MISS_DISTANCE};

use crate::EnginePhase;
use crate::engine::mesh::MeshVertexStore;
use crate::engine::session::{DeviceTracker, PoseExt};
use crate::fitting::cache::ResultCache;
use crate::fitting::telemetry::FoundTimer;
use crate::fitting::{FindSurfaceEngine, FitParams, FitResult};

/// The fitting engine in use. Inserted by the application.
#[derive(Resource, Clone)]
pub struct FitEngine(pub Arc<dyn FindSurfaceEngine>);

/// Detection-loop settings the UI toggles at runtime.
#[derive(Resource, Debug, Clone)]
pub struct FindSurfaceConfig {
    pub params: FitParams,
    /// Whether the loop submits fit requests at all.
    pub enabled: bool,
    /// One-shot confirmation: the next result (or a fresh cached one) is
    /// committed instead of previewed.
    pub take_next_as_result: bool,
    pub enable_full_cone_conversion: bool,
}

impl Default for FindSurfaceConfig {
    fn default() -> Self {
        FindSurfaceConfig {
            params: FitParams::default(),
            enabled: false,
            take_next_as_result: false,
            enable_full_cone_conversion: true,
        }
    }
}

/// Restart generation of the detection loop. Bumping it abandons requests
/// already in flight.
#[derive(Resource, Debug, Default)]
pub struct DetectionLoop {
    generation: u64,
}

impl DetectionLoop {
    pub fn restart(&mut self) {
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Where the gaze indicator sits this frame: the mesh hit, or a fixed
/// distance ahead on a miss.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PickingIndicator {
    pub position: Vec3,
}

/// The picked triangle, vertices ordered nearest-first to the hit.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct TriangleHighlight {
    pub vertices: Option<(Vec3, Vec3, Vec3)>,
}

/// Latest previewed fit, shown while detection runs without a confirmation.
#[derive(Resource, Debug, Default)]
pub struct PreviewState {
    pub result: Option<FitResult>,
    pub visible: bool,
}

/// One queued engine invocation.
#[derive(Debug, Clone)]
pub struct FitRequest {
    pub points: Arc<Vec<Vec3>>,
    pub seed_index: usize,
    pub gesture: Vec3,
    pub origin_from_device: Mat4,
    pub generation: u64,
}

/// FIFO of pending fit requests.
#[derive(Resource, Clone)]
pub struct FitQueue {
    tx: Sender<FitRequest>,
    rx: Receiver<FitRequest>,
}

impl Default for FitQueue {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        FitQueue { tx, rx }
    }
}

impl FitQueue {
    pub fn submit(&self, request: FitRequest) {
        let _ = self.tx.send(request);
    }

    pub fn drain(&self) -> impl Iterator<Item = FitRequest> + '_ {
        self.rx.try_iter()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Serializes engine invocations. The engine is not reentrant.
#[derive(Resource, Default)]
pub struct FitGate(Mutex<()>);

impl FitGate {
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

/// Detection outcome surfaced to the UI layer each tick.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionFeedback {
    Found,
    NotFound,
    Committed,
}

/// An aligned result the user confirmed, handed to the object tracker.
#[derive(Event, Debug, Clone)]
pub struct ConfirmedDetection {
    pub result: FitResult,
    pub gesture: Vec3,
    pub origin_from_device: Mat4,
}

pub fn find_surface_tick(
    store: Res<MeshVertexStore>,
    device: Res<DeviceTracker>,
    config: Res<FindSurfaceConfig>,
    loop_state: Res<DetectionLoop>,
    queue: Res<FitQueue>,
    mut timer: ResMut<FoundTimer>,
    mut indicator: ResMut<PickingIndicator>,
    mut triangle: ResMut<TriangleHighlight>,
    mut preview: ResMut<PreviewState>,
) {
    let origin = device.position();
    let direction = device.forward();

    let picked = store
        .raycast(origin, direction)
        .and_then(|pick| {
            store
                .nearest_triangle_vertices(&pick)
                .map(|vertices| (pick, vertices))
        });
    let Some((pick, (nearest, second, third))) = picked else {
        timer.record(false);
        preview.visible = false;
        triangle.vertices = None;
        indicator.position = origin + direction * PICKING_MISS_DISTANCE;
        return;
    };

    triangle.vertices = Some((nearest, second, third));
    indicator.position = pick.position;

    if !config.enabled {
        return;
    }

    // The seed is the exact cloud entry for the nearest triangle vertex; if
    // the patch changed under us this frame, skip the tick.
    let Some(seed_index) = store.seed_index_of(nearest) else {
        return;
    };
    queue.submit(FitRequest {
        points: Arc::new(store.flattened_vertices()),
        seed_index,
        gesture: pick.position,
        origin_from_device: device.origin_from_device,
        generation: loop_state.generation(),
    });
}

pub fn process_fit_requests(
    engine: Option<Res<FitEngine>>,
    gate: Res<FitGate>,
    queue: Res<FitQueue>,
    loop_state: Res<DetectionLoop>,
    mut config: ResMut<FindSurfaceConfig>,
    mut timer: ResMut<FoundTimer>,
    mut cache: ResMut<ResultCache>,
    mut preview: ResMut<PreviewState>,
    mut feedback: EventWriter<DetectionFeedback>,
    mut confirmed: EventWriter<ConfirmedDetection>,
) {
    let Some(engine) = engine else {
        return;
    };
    for request in queue.drain() {
        if request.generation != loop_state.generation() {
            // The loop restarted since this was queued.
            continue;
        }
        let outcome = gate.run(|| {
            engine
                .0
                .perform(&request.points, request.seed_index, &config.params)
        });
        let mut result = match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!("fit invocation failed, treating as a miss: {error}");
                FitResult::None
            }
        };
        if !result.is_none() {
            result.align_and_localize(
                request.gesture,
                request.origin_from_device.position(),
                config.enable_full_cone_conversion,
                FULL_CONE_RADII_RATIO,
            );
        }

        let now = Instant::now();
        if result.is_none() {
            timer.record(false);
        } else {
            timer.record(true);
            cache.store(&result, request.gesture, now);
        }

        if config.take_next_as_result {
            config.take_next_as_result = false;
            if result.is_none() {
                match cache.take_near(request.gesture, now) {
                    Some(cached) => result = cached,
                    None => {
                        preview.visible = false;
                        feedback.write(DetectionFeedback::NotFound);
                        continue;
                    }
                }
            }
            preview.visible = false;
            feedback.write(DetectionFeedback::Committed);
            confirmed.write(ConfirmedDetection {
                result,
                gesture: request.gesture,
                origin_from_device: request.origin_from_device,
            });
        } else if result.is_none() {
            preview.visible = false;
            feedback.write(DetectionFeedback::NotFound);
        } else {
            preview.result = Some(result);
            preview.visible = true;
            feedback.write(DetectionFeedback::Found);
        }
    }
}

pub struct DetectionPlugin;

impl Plugin for DetectionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FindSurfaceConfig>()
            .init_resource::<DetectionLoop>()
            .init_resource::<FitQueue>()
            .init_resource::<FitGate>()
            .init_resource::<FoundTimer>()
            .init_resource::<ResultCache>()
            .init_resource::<PickingIndicator>()
            .init_resource::<TriangleHighlight>()
            .init_resource::<PreviewState>()
            .add_event::<DetectionFeedback>()
            .add_event::<ConfirmedDetection>()
            .add_systems(
                Update,
                (find_surface_tick, process_fit_requests)
                    .chain()
                    .in_set(EnginePhase::Detect),
            );
    }
}
