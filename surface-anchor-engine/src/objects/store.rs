//! JSON-backed store for committed objects and their media records.
//!
//! Mutations happen in memory and hit the disk when a transaction commits,
//! so a batch of changes lands as one write.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::session::AnchorId;
use crate::objects::PersistedObject;
use crate::objects::media::MediaRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreRecords {
    objects: Vec<PersistedObject>,
    media: Vec<MediaRecord>,
}

#[derive(Debug, Default)]
pub struct ObjectStore {
    path: Option<PathBuf>,
    objects: HashMap<AnchorId, PersistedObject>,
    media: HashMap<String, MediaRecord>,
}

impl ObjectStore {
    /// Store with no backing file; commits are no-ops.
    pub fn in_memory() -> Self {
        ObjectStore::default()
    }

    /// Opens (or initializes) a store backed by the given file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = ObjectStore {
            path: Some(path.clone()),
            ..ObjectStore::default()
        };
        if path.exists() {
            let records: StoreRecords = serde_json::from_str(&fs::read_to_string(&path)?)?;
            for object in records.objects {
                store.objects.insert(object.id, object);
            }
            for record in records.media {
                store.media.insert(record.id.clone(), record);
            }
        }
        store
            .path
            .as_ref()
            .and_then(|p| p.parent())
            .map(fs::create_dir_all)
            .transpose()?;
        Ok(store)
    }

    pub fn object(&self, id: &AnchorId) -> Option<&PersistedObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: &AnchorId) -> Option<&mut PersistedObject> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &PersistedObject> {
        self.objects.values()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn insert_object(&mut self, object: PersistedObject) {
        self.objects.insert(object.id, object);
    }

    pub fn remove_object(&mut self, id: &AnchorId) -> Option<PersistedObject> {
        self.objects.remove(id)
    }

    pub fn media(&self, id: &str) -> Option<&MediaRecord> {
        self.media.get(id)
    }

    pub fn insert_media(&mut self, record: MediaRecord) {
        self.media.insert(record.id.clone(), record);
    }

    pub fn media_records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.media.values()
    }

    /// Applies a batch of mutations and writes the store once.
    pub fn transaction(&mut self, apply: impl FnOnce(&mut Self)) -> Result<(), StoreError> {
        apply(self);
        self.commit()
    }

    /// Writes the current contents to the backing file, if any.
    pub fn commit(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut records = StoreRecords {
            objects: self.objects.values().cloned().collect(),
            media: self.media.values().cloned().collect(),
        };
        // Stable file contents regardless of map iteration order.
        records.objects.sort_by(|a, b| a.name.cmp(&b.name));
        records.media.sort_by(|a, b| a.id.cmp(&b.id));
        fs::write(path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }
}

/// The store for the running session.
#[derive(Resource, Debug, Default)]
pub struct PersistentStore(pub ObjectStore);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::FitResult;
    use crate::fitting::geometry::Plane;
    use crate::objects::PendingObject;
    use bevy::math::{Mat4, Vec3};

    fn sample_object(name_ordinal: usize) -> PersistedObject {
        let pending = PendingObject::from_result(
            FitResult::Plane {
                plane: Plane {
                    extrinsics: Mat4::IDENTITY,
                    width: 1.0,
                    height: 1.0,
                },
                inliers: vec![Vec3::ZERO, Vec3::X],
                rms_error: 0.004,
            },
            name_ordinal,
            "demo.png".into(),
            Vec3::new(0.2, 0.0, 0.0),
            Mat4::from_translation(Vec3::new(0.0, 1.5, 1.0)),
        )
        .unwrap();
        PersistedObject::from_pending(pending, AnchorId::new(), 1.5)
    }

    #[test]
    fn survives_a_reopen() {
        let dir = std::env::temp_dir().join(format!("screen-store-{}", std::process::id()));
        let path = dir.join("objects.json");
        let _ = fs::remove_file(&path);

        let first = sample_object(0);
        let second = sample_object(1);
        {
            let mut store = ObjectStore::open(&path).unwrap();
            store
                .transaction(|store| {
                    store.insert_object(first.clone());
                    store.insert_object(second.clone());
                    store.insert_media(crate::objects::media::MediaRecord {
                        id: "demo.png".into(),
                        kind: crate::objects::media::MediaKind::Photo,
                        aspect_ratio: 1.5,
                    });
                })
                .unwrap();
        }

        let reopened = ObjectStore::open(&path).unwrap();
        assert_eq!(reopened.object_count(), 2);
        assert_eq!(reopened.object(&first.id), Some(&first));
        assert!(reopened.media("demo.png").is_some());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn removal_is_persisted_by_the_next_commit() {
        let dir = std::env::temp_dir().join(format!("screen-store-rm-{}", std::process::id()));
        let path = dir.join("objects.json");
        let _ = fs::remove_file(&path);

        let object = sample_object(0);
        let mut store = ObjectStore::open(&path).unwrap();
        store
            .transaction(|store| store.insert_object(object.clone()))
            .unwrap();
        store
            .transaction(|store| {
                store.remove_object(&object.id);
            })
            .unwrap();

        let reopened = ObjectStore::open(&path).unwrap();
        assert_eq!(reopened.object_count(), 0);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn in_memory_store_commits_quietly() {
        let mut store = ObjectStore::in_memory();
        store
            .transaction(|store| store.insert_object(sample_object(0)))
            .unwrap();
        assert_eq!(store.object_count(), 1);
    }
}
