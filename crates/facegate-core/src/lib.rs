//! facegate-core — Face location, description and access decisions.
//!
//! Faces are located with SCRFD and described either by a hand-rolled
//! texture histogram or a pretrained SFace embedding (ONNX Runtime, CPU).
//! The gallery and access log are plain JSON files.

pub mod access_log;
pub mod config;
pub mod cooldown;
pub mod detector;
pub mod embedding;
pub mod enroll;
pub mod extractor;
pub mod gallery;
pub mod imaging;
pub mod locator;
pub mod matcher;
pub mod pipeline;
pub mod types;

pub use access_log::{AccessLog, AccessLogEntry, AccessStatus};
pub use config::Config;
pub use gallery::{GalleryStore, Identity, SharedGallery};
pub use pipeline::Pipeline;
pub use types::{Descriptor, ExtractorKind, FaceRegion, MatchResult, UNKNOWN_NAME};
