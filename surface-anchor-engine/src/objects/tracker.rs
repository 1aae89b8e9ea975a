//! Anchor lifecycle for committed screens.
//!
//! A confirmed detection becomes a pending object plus a world-anchor
//! registration. When the platform reports the anchor, the pending object is
//! persisted, pushed on the undo stack and spawned; an anchor the store
//! already knows restores its object instead; an anchor nobody knows is
//! handed back to the platform for removal. Anchor pose updates re-pose the
//! spawned entities and refresh the stored extrinsics.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::EnginePhase;
use crate::engine::session::{AnchorId, AnchorRegistry, WorldAnchorEvent};
use crate::fitting::orchestrator::ConfirmedDetection;
use crate::frames::ScreenPlacement;
use crate::objects::media::MediaLibrary;
use crate::objects::store::PersistentStore;
use crate::objects::{PendingObject, PersistedObject};

/// A spawned screen entity.
#[derive(Component, Debug)]
pub struct ScreenObject {
    pub id: AnchorId,
    pub placement: ScreenPlacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightMode {
    #[default]
    None,
    Hovered,
    Selected,
}

#[derive(Component, Debug, Default)]
pub struct Highlight(pub HighlightMode);

/// Accumulated idle-animation time for screens that spin in place.
#[derive(Component, Debug, Default)]
pub struct AnimationPhase(pub f32);

/// User-level operations on committed objects.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCommand {
    /// Remove the most recently committed object of this session.
    Undo,
    /// Remove every committed object.
    ClearAll,
    Delete(AnchorId),
    Select(Option<AnchorId>),
}

/// Pending and spawned objects, session undo history and selection.
#[derive(Resource, Debug, Default)]
pub struct ObjectTracker {
    pending: HashMap<AnchorId, PendingObject>,
    entities: HashMap<AnchorId, Entity>,
    undo_stack: Vec<AnchorId>,
    pub selected: Option<AnchorId>,
}

impl ObjectTracker {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn committed_count(&self) -> usize {
        self.entities.len()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn entity_of(&self, id: &AnchorId) -> Option<Entity> {
        self.entities.get(id).copied()
    }

    pub fn committed_ids(&self) -> impl Iterator<Item = AnchorId> + '_ {
        self.entities.keys().copied()
    }
}

/// Turns confirmed detections into pending objects and anchor registrations.
pub fn handle_confirmed_detections(
    mut detections: EventReader<ConfirmedDetection>,
    mut tracker: ResMut<ObjectTracker>,
    store: Res<PersistentStore>,
    media: Res<MediaLibrary>,
    registry: Option<Res<AnchorRegistry>>,
) {
    let Some(registry) = registry else {
        return;
    };
    for detection in detections.read() {
        let Some(media_id) = media.current.clone() else {
            warn!("no media selected, dropping confirmed detection");
            continue;
        };
        let ordinal = tracker.pending.len() + store.0.object_count();
        let Some(pending) = PendingObject::from_result(
            detection.result.clone(),
            ordinal,
            media_id,
            detection.gesture,
            detection.origin_from_device,
        ) else {
            // Confirmations are filtered upstream; a miss reaching this
            // point is a bug, not a recoverable condition.
            unreachable!("confirmed detection carried no geometry");
        };
        match registry.0.add_anchor(pending.geometry.extrinsics()) {
            Ok(anchor) => {
                info!("registered anchor {} for '{}'", anchor.id, pending.name);
                tracker.pending.insert(anchor.id, pending);
            }
            Err(error) => {
                warn!("anchor registration failed for '{}': {error}", pending.name);
            }
        }
    }
}

/// Applies anchor lifecycle events from the platform.
pub fn handle_world_anchor_events(
    mut events: EventReader<WorldAnchorEvent>,
    mut tracker: ResMut<ObjectTracker>,
    mut persistent: ResMut<PersistentStore>,
    media: Res<MediaLibrary>,
    registry: Option<Res<AnchorRegistry>>,
    mut screens: Query<&mut Transform, With<ScreenObject>>,
    mut commands: Commands,
) {
    for event in events.read() {
        match *event {
            WorldAnchorEvent::Added(anchor) => {
                let object = if let Some(pending) = tracker.pending.remove(&anchor.id) {
                    let aspect_ratio = media
                        .aspect_ratio_of(&pending.media_id)
                        .unwrap_or(1.0);
                    let object = PersistedObject::from_pending(pending, anchor.id, aspect_ratio);
                    if let Err(error) =
                        persistent.0.transaction(|store| store.insert_object(object.clone()))
                    {
                        warn!("failed to persist '{}': {error}", object.name);
                    }
                    tracker.undo_stack.push(anchor.id);
                    Some(object)
                } else {
                    // Not ours from this session; maybe a restored one.
                    persistent.0.object(&anchor.id).cloned()
                };
                let Some(object) = object else {
                    info!("discarding unknown anchor {}", anchor.id);
                    if let Some(registry) = &registry
                        && let Err(error) = registry.0.remove_anchor(anchor.id)
                    {
                        warn!("failed to discard anchor {}: {error}", anchor.id);
                    }
                    continue;
                };

                let transform = Transform::from_matrix(
                    object.placement.frame().world_matrix(anchor.origin_from_anchor),
                );
                info!("spawning screen '{}' at {:?}", object.name, transform.translation);
                let entity = commands
                    .spawn((
                        ScreenObject {
                            id: anchor.id,
                            placement: object.placement.clone(),
                        },
                        Highlight::default(),
                        AnimationPhase::default(),
                        transform,
                    ))
                    .id();
                tracker.entities.insert(anchor.id, entity);
            }
            WorldAnchorEvent::Updated(anchor) => {
                if let Some(object) = persistent.0.object_mut(&anchor.id) {
                    object.geometry.set_extrinsics(anchor.origin_from_anchor);
                    let world =
                        object.placement.frame().world_matrix(anchor.origin_from_anchor);
                    if let Some(entity) = tracker.entities.get(&anchor.id)
                        && let Ok(mut transform) = screens.get_mut(*entity)
                    {
                        *transform = Transform::from_matrix(world);
                    }
                }
            }
            WorldAnchorEvent::Removed(id) => {
                remove_object(id, &mut tracker, &mut persistent, &mut commands);
            }
        }
    }
}

/// Applies undo/clear/delete/select commands.
pub fn handle_object_commands(
    mut object_commands: EventReader<ObjectCommand>,
    mut tracker: ResMut<ObjectTracker>,
    mut persistent: ResMut<PersistentStore>,
    registry: Option<Res<AnchorRegistry>>,
    mut highlights: Query<(&ScreenObject, &mut Highlight)>,
    mut commands: Commands,
) {
    for command in object_commands.read() {
        match *command {
            ObjectCommand::Undo => {
                if let Some(id) = tracker.undo_stack.last().copied() {
                    delete_object(id, &mut tracker, &mut persistent, &registry, &mut commands);
                }
            }
            ObjectCommand::ClearAll => {
                let ids: Vec<AnchorId> = tracker.committed_ids().collect();
                for id in ids {
                    delete_object(id, &mut tracker, &mut persistent, &registry, &mut commands);
                }
            }
            ObjectCommand::Delete(id) => {
                delete_object(id, &mut tracker, &mut persistent, &registry, &mut commands);
            }
            ObjectCommand::Select(selection) => {
                tracker.selected = selection;
                for (screen, mut highlight) in &mut highlights {
                    highlight.0 = if selection == Some(screen.id) {
                        HighlightMode::Selected
                    } else {
                        HighlightMode::None
                    };
                }
            }
        }
    }
}

fn delete_object(
    id: AnchorId,
    tracker: &mut ObjectTracker,
    persistent: &mut PersistentStore,
    registry: &Option<Res<AnchorRegistry>>,
    commands: &mut Commands,
) {
    if let Some(registry) = registry
        && let Err(error) = registry.0.remove_anchor(id)
    {
        warn!("failed to remove anchor {id}: {error}");
    }
    // Local cleanup happens immediately; the provider's Removed echo later
    // finds nothing left to do.
    remove_object(id, tracker, persistent, commands);
}

fn remove_object(
    id: AnchorId,
    tracker: &mut ObjectTracker,
    persistent: &mut PersistentStore,
    commands: &mut Commands,
) {
    tracker.pending.remove(&id);
    if let Some(position) = tracker.undo_stack.iter().position(|other| *other == id) {
        tracker.undo_stack.remove(position);
    }
    if let Some(entity) = tracker.entities.remove(&id) {
        commands.entity(entity).despawn();
    }
    if tracker.selected == Some(id) {
        tracker.selected = None;
    }
    if persistent.0.object(&id).is_some()
        && let Err(error) = persistent.0.transaction(|store| {
            store.remove_object(&id);
        })
    {
        warn!("failed to persist removal of {id}: {error}");
    }
}

/// Advances the idle animation on screens that spin in place.
pub fn animate_screens(time: Res<Time>, mut screens: Query<(&ScreenObject, &mut AnimationPhase)>) {
    for (screen, mut phase) in &mut screens {
        if screen.placement.animates() {
            phase.0 += time.delta_secs();
        }
    }
}

pub struct ObjectTrackerPlugin;

impl Plugin for ObjectTrackerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ObjectTracker>()
            .init_resource::<PersistentStore>()
            .init_resource::<MediaLibrary>()
            .add_event::<ObjectCommand>()
            .add_event::<WorldAnchorEvent>()
            .add_systems(
                Update,
                (
                    handle_confirmed_detections,
                    handle_world_anchor_events,
                    handle_object_commands,
                    animate_screens,
                )
                    .chain()
                    .in_set(EnginePhase::Objects),
            );
    }
}
