//! Enrolled identities and their persisted snapshot.

use crate::types::{Descriptor, ExtractorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("no enrolled face named '{0}'")]
    NotFound(String),
    #[error("descriptor from the {actual} extractor cannot join a {expected} gallery")]
    KindMismatch {
        expected: ExtractorKind,
        actual: ExtractorKind,
    },
    #[error("descriptor has {actual} values, gallery expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("gallery I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("gallery encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One enrolled person.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub name: String,
    pub descriptor: Descriptor,
}

/// Whether `add` created a new identity or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    Inserted,
    Replaced,
}

/// Insertion-ordered, name-unique set of identities of a single extractor kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
    kind: ExtractorKind,
    identities: Vec<Identity>,
}

impl Gallery {
    pub fn new(kind: ExtractorKind) -> Self {
        Self {
            kind,
            identities: Vec::new(),
        }
    }

    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.name == name)
    }

    /// Names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.identities.iter().map(|i| i.name.clone()).collect()
    }

    /// Insert `name`, replacing (and moving to the end) any existing entry.
    pub fn add(&mut self, name: &str, descriptor: Descriptor) -> Result<Added, GalleryError> {
        if name.is_empty() {
            return Err(GalleryError::EmptyName);
        }
        if descriptor.kind != self.kind {
            return Err(GalleryError::KindMismatch {
                expected: self.kind,
                actual: descriptor.kind,
            });
        }
        let expected = self.kind.dimension();
        if descriptor.len() != expected {
            return Err(GalleryError::DimensionMismatch {
                expected,
                actual: descriptor.len(),
            });
        }

        let added = match self.position(name) {
            Some(idx) => {
                self.identities.remove(idx);
                Added::Replaced
            }
            None => Added::Inserted,
        };
        self.identities.push(Identity {
            name: name.to_string(),
            descriptor,
        });
        Ok(added)
    }

    pub fn remove(&mut self, name: &str) -> Result<Identity, GalleryError> {
        let idx = self
            .position(name)
            .ok_or_else(|| GalleryError::NotFound(name.to_string()))?;
        Ok(self.identities.remove(idx))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.identities.iter().position(|i| i.name == name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FaceRecord {
    name: String,
    #[serde(alias = "encoding")]
    descriptor: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    extractor: ExtractorKind,
    faces: Vec<FaceRecord>,
}

/// On-disk forms accepted when loading.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredGallery {
    Tagged(Snapshot),
    /// Bare record array; assumed to match the configured extractor.
    Untagged(Vec<FaceRecord>),
}

/// A [`Gallery`] backed by a JSON snapshot that is rewritten after every mutation.
#[derive(Debug)]
pub struct GalleryStore {
    path: PathBuf,
    gallery: Gallery,
}

/// The gallery as shared between the recognition worker and the foreground.
pub type SharedGallery = Arc<RwLock<GalleryStore>>;

impl GalleryStore {
    /// Load the snapshot at `path` for descriptors of `kind`.
    ///
    /// A missing file gives an empty gallery. An unreadable or corrupt file,
    /// or one written by a different extractor, also gives an empty gallery
    /// and a warning.
    pub fn open(path: impl Into<PathBuf>, kind: ExtractorKind) -> Self {
        let path = path.into();
        let gallery = match load_snapshot(&path, kind) {
            Ok(Some(g)) => {
                tracing::info!(path = %path.display(), faces = g.len(), "loaded gallery");
                g
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no gallery snapshot; starting empty");
                Gallery::new(kind)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "gallery snapshot unreadable; starting empty");
                Gallery::new(kind)
            }
        };
        Self { path, gallery }
    }

    pub fn shared(self) -> SharedGallery {
        Arc::new(RwLock::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn identities(&self) -> &[Identity] {
        self.gallery.identities()
    }

    pub fn names(&self) -> Vec<String> {
        self.gallery.names()
    }

    pub fn len(&self) -> usize {
        self.gallery.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gallery.is_empty()
    }

    /// Add or replace `name` and persist. On a failed write the gallery is left as it was.
    pub fn add(&mut self, name: &str, descriptor: Descriptor) -> Result<Added, GalleryError> {
        let before = self.gallery.clone();
        let added = self.gallery.add(name, descriptor)?;
        if let Err(e) = self.persist() {
            self.gallery = before;
            return Err(e);
        }
        tracing::info!(name, replaced = added == Added::Replaced, "enrolled face");
        Ok(added)
    }

    /// Remove `name` and persist. On a failed write the gallery is left as it was.
    pub fn remove(&mut self, name: &str) -> Result<(), GalleryError> {
        let before = self.gallery.clone();
        self.gallery.remove(name)?;
        if let Err(e) = self.persist() {
            self.gallery = before;
            return Err(e);
        }
        tracing::info!(name, "removed face");
        Ok(())
    }

    /// Write the whole gallery to a sibling temp file and rename it into place.
    pub fn persist(&self) -> Result<(), GalleryError> {
        let snapshot = Snapshot {
            extractor: self.gallery.kind(),
            faces: self
                .gallery
                .identities()
                .iter()
                .map(|i| FaceRecord {
                    name: i.name.clone(),
                    descriptor: i.descriptor.values.clone(),
                })
                .collect(),
        };
        let data = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(&self.path);
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), faces = self.gallery.len(), "gallery persisted");
        Ok(())
    }
}

/// Lock for reading, recovering the data if a writer panicked.
pub fn read_gallery(gallery: &SharedGallery) -> RwLockReadGuard<'_, GalleryStore> {
    gallery.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Lock for writing, recovering the data if a writer panicked.
pub fn write_gallery(gallery: &SharedGallery) -> RwLockWriteGuard<'_, GalleryStore> {
    gallery.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_snapshot(path: &Path, kind: ExtractorKind) -> Result<Option<Gallery>, GalleryError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path)?;
    let records = match serde_json::from_slice::<StoredGallery>(&data)? {
        StoredGallery::Tagged(snapshot) if snapshot.extractor != kind => {
            tracing::warn!(
                stored = %snapshot.extractor,
                configured = %kind,
                "gallery was built with a different extractor; ignoring it"
            );
            return Ok(Some(Gallery::new(kind)));
        }
        StoredGallery::Tagged(snapshot) => snapshot.faces,
        StoredGallery::Untagged(records) => records,
    };

    let mut gallery = Gallery::new(kind);
    for record in records {
        let name = record.name.clone();
        if let Err(e) = gallery.add(&record.name, Descriptor::new(kind, record.descriptor)) {
            tracing::warn!(name = %name, error = %e, "skipping invalid gallery record");
        }
    }
    Ok(Some(gallery))
}
