//! Imported media the screens display. Photos are probed for their pixel
//! aspect ratio; videos get a fixed 16:9 until playback knows better.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PHOTO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

pub const DEFAULT_VIDEO_ASPECT_RATIO: f32 = 16.0 / 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// File name, which doubles as the stable identifier.
    pub id: String,
    pub kind: MediaKind,
    /// Width over height.
    pub aspect_ratio: f32,
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported media type '{0}'")]
    UnsupportedType(String),
    #[error("media file has no usable name")]
    MissingFileName,
    #[error("failed to probe image: {0}")]
    Probe(#[from] image::ImageError),
}

/// Builds a record for a media file on disk.
pub fn import_media(path: &Path) -> Result<MediaRecord, MediaError> {
    let id = path
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or(MediaError::MissingFileName)?
        .to_string();
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if PHOTO_EXTENSIONS.contains(&extension.as_str()) {
        let (width, height) = image::image_dimensions(path)?;
        Ok(MediaRecord {
            id,
            kind: MediaKind::Photo,
            aspect_ratio: width as f32 / height as f32,
        })
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(MediaRecord {
            id,
            kind: MediaKind::Video,
            aspect_ratio: DEFAULT_VIDEO_ASPECT_RATIO,
        })
    } else {
        Err(MediaError::UnsupportedType(extension))
    }
}

/// The media known to this session and the one new screens will display.
#[derive(Resource, Debug, Default)]
pub struct MediaLibrary {
    records: HashMap<String, MediaRecord>,
    pub current: Option<String>,
}

impl MediaLibrary {
    /// Registers a record; the first one becomes current.
    pub fn insert(&mut self, record: MediaRecord) {
        if self.current.is_none() {
            self.current = Some(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    pub fn import_file(&mut self, path: &Path) -> Result<&MediaRecord, MediaError> {
        let record = import_media(path)?;
        let id = record.id.clone();
        self.insert(record);
        Ok(&self.records[&id])
    }

    pub fn get(&self, id: &str) -> Option<&MediaRecord> {
        self.records.get(id)
    }

    pub fn aspect_ratio_of(&self, id: &str) -> Option<f32> {
        self.records.get(id).map(|record| record.aspect_ratio)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn video_records_use_the_default_aspect() {
        let record = import_media(&PathBuf::from("/tmp/clip.MOV")).unwrap();
        assert_eq!(record.kind, MediaKind::Video);
        assert_eq!(record.id, "clip.MOV");
        assert_eq!(record.aspect_ratio, DEFAULT_VIDEO_ASPECT_RATIO);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        assert!(matches!(
            import_media(&PathBuf::from("/tmp/notes.txt")),
            Err(MediaError::UnsupportedType(ext)) if ext == "txt"
        ));
    }

    #[test]
    fn first_inserted_record_becomes_current() {
        let mut library = MediaLibrary::default();
        library.insert(MediaRecord {
            id: "a.png".into(),
            kind: MediaKind::Photo,
            aspect_ratio: 1.0,
        });
        library.insert(MediaRecord {
            id: "b.png".into(),
            kind: MediaKind::Photo,
            aspect_ratio: 2.0,
        });
        assert_eq!(library.current.as_deref(), Some("a.png"));
        assert_eq!(library.aspect_ratio_of("b.png"), Some(2.0));
        assert_eq!(library.len(), 2);
    }
}
