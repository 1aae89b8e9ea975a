//! Provider session: channels carrying platform updates into the ECS and the
//! world-anchor registration surface.
//!
//! The AR platform runs on its own threads; everything it produces (device
//! pose, hand poses, mesh anchors, world anchors) arrives through crossbeam
//! channels and is drained into resources and events at the start of every
//! frame, so the rest of the engine only ever sees single-threaded state.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::{collections::HashSet, sync::Arc};

use bevy::math::{Mat4, Vec3};
use bevy::prelude::*;
use crossbeam::channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::EnginePhase;
use crate::engine::mesh::MeshAnchorEvent;

/// Identity of a platform anchor (mesh or world).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(Uuid);

impl AnchorId {
    pub fn new() -> Self {
        AnchorId(Uuid::new_v4())
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        AnchorId::new()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AnchorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(AnchorId)
    }
}

/// A tracked world anchor and its latest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldAnchor {
    pub id: AnchorId,
    pub origin_from_anchor: Mat4,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum WorldAnchorEvent {
    Added(WorldAnchor),
    Updated(WorldAnchor),
    Removed(AnchorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chirality {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPoseUpdate {
    pub chirality: Chirality,
    pub origin_from_hand: Mat4,
}

/// Latest device (head) pose. Columns are the device basis axes; the device
/// looks along its negative z axis.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct DeviceTracker {
    pub origin_from_device: Mat4,
}

impl Default for DeviceTracker {
    fn default() -> Self {
        DeviceTracker {
            origin_from_device: Mat4::IDENTITY,
        }
    }
}

impl DeviceTracker {
    pub fn position(&self) -> Vec3 {
        self.origin_from_device.position()
    }

    pub fn forward(&self) -> Vec3 {
        -self.origin_from_device.basis_z()
    }
}

/// Latest hand poses, if the platform reports them.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct HandTracker {
    pub left: Option<Mat4>,
    pub right: Option<Mat4>,
}

/// Basis-column accessors shared by pose math throughout the engine.
pub trait PoseExt {
    fn basis_x(&self) -> Vec3;
    fn basis_y(&self) -> Vec3;
    fn basis_z(&self) -> Vec3;
    fn position(&self) -> Vec3;
}

impl PoseExt for Mat4 {
    fn basis_x(&self) -> Vec3 {
        self.x_axis.truncate()
    }

    fn basis_y(&self) -> Vec3 {
        self.y_axis.truncate()
    }

    fn basis_z(&self) -> Vec3 {
        self.z_axis.truncate()
    }

    fn position(&self) -> Vec3 {
        self.w_axis.truncate()
    }
}

/// Builds an affine matrix from basis columns and a translation.
pub fn extrinsics(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3, position: Vec3) -> Mat4 {
    Mat4::from_cols(
        x_axis.extend(0.0),
        y_axis.extend(0.0),
        z_axis.extend(0.0),
        position.extend(1.0),
    )
}

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("world anchor registration rejected by the platform")]
    Rejected,
    #[error("unknown world anchor {0}")]
    Unknown(AnchorId),
}

/// Registration surface for world anchors. Outcomes are reported
/// asynchronously as [`WorldAnchorEvent`]s on the session feed.
pub trait WorldAnchorProvider: Send + Sync {
    fn add_anchor(&self, origin_from_anchor: Mat4) -> Result<WorldAnchor, AnchorError>;
    fn remove_anchor(&self, id: AnchorId) -> Result<(), AnchorError>;
}

/// The provider the object tracker registers anchors with.
#[derive(Resource, Clone)]
pub struct AnchorRegistry(pub Arc<dyn WorldAnchorProvider>);

/// In-process provider used by tests and the headless demo. Registration
/// succeeds immediately and echoes the matching event onto the feed.
pub struct LocalAnchorProvider {
    events: Sender<WorldAnchorEvent>,
    registered: Mutex<HashSet<AnchorId>>,
    rejecting: AtomicBool,
}

impl LocalAnchorProvider {
    pub fn new(events: Sender<WorldAnchorEvent>) -> Self {
        LocalAnchorProvider {
            events,
            registered: Mutex::new(HashSet::new()),
            rejecting: AtomicBool::new(false),
        }
    }

    /// Makes subsequent registrations fail, for exercising rejection paths.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

impl WorldAnchorProvider for LocalAnchorProvider {
    fn add_anchor(&self, origin_from_anchor: Mat4) -> Result<WorldAnchor, AnchorError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(AnchorError::Rejected);
        }
        let anchor = WorldAnchor {
            id: AnchorId::new(),
            origin_from_anchor,
        };
        if let Ok(mut registered) = self.registered.lock() {
            registered.insert(anchor.id);
        }
        let _ = self.events.send(WorldAnchorEvent::Added(anchor));
        Ok(anchor)
    }

    fn remove_anchor(&self, id: AnchorId) -> Result<(), AnchorError> {
        let known = self
            .registered
            .lock()
            .map(|mut registered| registered.remove(&id))
            .unwrap_or(false);
        if !known {
            return Err(AnchorError::Unknown(id));
        }
        let _ = self.events.send(WorldAnchorEvent::Removed(id));
        Ok(())
    }
}

/// Sender half handed to the platform integration (or a test script).
#[derive(Clone)]
pub struct SessionFeeds {
    pub mesh: Sender<MeshAnchorEvent>,
    pub world: Sender<WorldAnchorEvent>,
    pub device: Sender<Mat4>,
    pub hands: Sender<HandPoseUpdate>,
}

#[derive(Resource)]
pub struct MeshEventReceiver(Receiver<MeshAnchorEvent>);

#[derive(Resource)]
pub struct WorldAnchorEventReceiver(Receiver<WorldAnchorEvent>);

#[derive(Resource)]
pub struct DevicePoseReceiver(Receiver<Mat4>);

#[derive(Resource)]
pub struct HandPoseReceiver(Receiver<HandPoseUpdate>);

/// Drains the provider channels into events and trackers each frame.
pub struct SessionPlugin {
    mesh: Receiver<MeshAnchorEvent>,
    world: Receiver<WorldAnchorEvent>,
    device: Receiver<Mat4>,
    hands: Receiver<HandPoseUpdate>,
}

impl SessionPlugin {
    /// Creates the session channels; the feeds go to whatever produces
    /// platform updates, the plugin goes into the app.
    pub fn channels() -> (SessionFeeds, SessionPlugin) {
        let (mesh_tx, mesh_rx) = unbounded();
        let (world_tx, world_rx) = unbounded();
        let (device_tx, device_rx) = unbounded();
        let (hands_tx, hands_rx) = unbounded();
        (
            SessionFeeds {
                mesh: mesh_tx,
                world: world_tx,
                device: device_tx,
                hands: hands_tx,
            },
            SessionPlugin {
                mesh: mesh_rx,
                world: world_rx,
                device: device_rx,
                hands: hands_rx,
            },
        )
    }
}

impl Plugin for SessionPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(MeshEventReceiver(self.mesh.clone()))
            .insert_resource(WorldAnchorEventReceiver(self.world.clone()))
            .insert_resource(DevicePoseReceiver(self.device.clone()))
            .insert_resource(HandPoseReceiver(self.hands.clone()))
            .init_resource::<DeviceTracker>()
            .init_resource::<HandTracker>()
            .add_event::<MeshAnchorEvent>()
            .add_event::<WorldAnchorEvent>()
            .add_systems(
                Update,
                (
                    ingest_device_pose,
                    ingest_hand_poses,
                    ingest_mesh_events,
                    ingest_world_anchor_events,
                )
                    .in_set(EnginePhase::Ingest),
            );
    }
}

fn ingest_device_pose(receiver: Res<DevicePoseReceiver>, mut device: ResMut<DeviceTracker>) {
    // Only the newest pose matters.
    if let Some(pose) = receiver.0.try_iter().last() {
        device.origin_from_device = pose;
    }
}

fn ingest_hand_poses(receiver: Res<HandPoseReceiver>, mut hands: ResMut<HandTracker>) {
    for update in receiver.0.try_iter() {
        match update.chirality {
            Chirality::Left => hands.left = Some(update.origin_from_hand),
            Chirality::Right => hands.right = Some(update.origin_from_hand),
        }
    }
}

fn ingest_mesh_events(
    receiver: Res<MeshEventReceiver>,
    mut events: EventWriter<MeshAnchorEvent>,
) {
    for event in receiver.0.try_iter() {
        events.write(event);
    }
}

fn ingest_world_anchor_events(
    receiver: Res<WorldAnchorEventReceiver>,
    mut events: EventWriter<WorldAnchorEvent>,
) {
    for event in receiver.0.try_iter() {
        events.write(event);
    }
}
