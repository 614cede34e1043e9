use crate::cooldown::DEFAULT_COOLDOWN;
use crate::types::ExtractorKind;
use std::path::PathBuf;
use std::time::Duration;

const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
const EMBEDDING_MODEL_FILE: &str = "face_recognition_sface_2021dec.onnx";

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory of still images to replay instead of opening the camera.
    pub frames_dir: Option<PathBuf>,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Gallery snapshot file.
    pub gallery_path: PathBuf,
    /// Access log file.
    pub log_path: PathBuf,
    /// Descriptor family used for enrollment and recognition.
    pub extractor: ExtractorKind,
    /// Initial match threshold (higher is stricter).
    pub tolerance: f32,
    /// Minimum time between logged decisions for one identity.
    pub cooldown: Duration,
    /// Run recognition on every Nth frame.
    pub frame_skip: u32,
    /// Bounded wait for one camera frame.
    pub read_timeout: Duration,
    /// Smallest accepted face side, in pixels.
    pub min_face_px: u32,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("FACEGATE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let extractor = std::env::var("FACEGATE_EXTRACTOR")
            .ok()
            .and_then(|v| match v.parse::<ExtractorKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "ignoring FACEGATE_EXTRACTOR");
                    None
                }
            })
            .unwrap_or(ExtractorKind::Histogram);

        Self {
            camera_device: std::env::var("FACEGATE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            frames_dir: std::env::var("FACEGATE_FRAMES_DIR").ok().map(PathBuf::from),
            model_dir: env_path("FACEGATE_MODEL_DIR").unwrap_or_else(|| data_dir.join("models")),
            gallery_path: env_path("FACEGATE_GALLERY_PATH")
                .unwrap_or_else(|| data_dir.join("gallery.json")),
            log_path: env_path("FACEGATE_LOG_PATH")
                .unwrap_or_else(|| data_dir.join("access_log.json")),
            extractor,
            tolerance: env_f32("FACEGATE_TOLERANCE", extractor.default_threshold()),
            cooldown: Duration::from_secs(env_u64("FACEGATE_COOLDOWN_SECS", DEFAULT_COOLDOWN.as_secs())),
            frame_skip: env_u32("FACEGATE_FRAME_SKIP", 2).max(1),
            read_timeout: Duration::from_millis(env_u64("FACEGATE_READ_TIMEOUT_MS", 2000)),
            min_face_px: env_u32("FACEGATE_MIN_FACE_PX", 60),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(DETECTOR_MODEL_FILE)
    }

    /// Path to the SFace recognition model.
    pub fn embedding_model_path(&self) -> PathBuf {
        self.model_dir.join(EMBEDDING_MODEL_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so every case lives in one test.
    #[test]
    fn test_from_env_defaults_and_overrides() {
        for key in [
            "FACEGATE_DATA_DIR",
            "FACEGATE_MODEL_DIR",
            "FACEGATE_GALLERY_PATH",
            "FACEGATE_LOG_PATH",
            "FACEGATE_EXTRACTOR",
            "FACEGATE_TOLERANCE",
            "FACEGATE_FRAME_SKIP",
            "FACEGATE_FRAMES_DIR",
        ] {
            std::env::remove_var(key);
        }
        std::env::set_var("FACEGATE_DATA_DIR", "/srv/facegate");

        let config = Config::from_env();
        assert_eq!(config.extractor, ExtractorKind::Histogram);
        assert_eq!(config.tolerance, 0.75);
        assert_eq!(config.gallery_path, PathBuf::from("/srv/facegate/gallery.json"));
        assert_eq!(config.log_path, PathBuf::from("/srv/facegate/access_log.json"));
        assert_eq!(
            config.detector_model_path(),
            PathBuf::from("/srv/facegate/models/det_10g.onnx")
        );
        assert_eq!(config.frame_skip, 2);
        assert!(config.frames_dir.is_none());

        std::env::set_var("FACEGATE_EXTRACTOR", "embedding");
        std::env::set_var("FACEGATE_FRAME_SKIP", "0");
        std::env::set_var("FACEGATE_TOLERANCE", "not-a-number");
        let config = Config::from_env();
        assert_eq!(config.extractor, ExtractorKind::Embedding);
        assert_eq!(config.tolerance, 0.4);
        assert_eq!(config.frame_skip, 1);

        std::env::set_var("FACEGATE_EXTRACTOR", "eigenfaces");
        assert_eq!(Config::from_env().extractor, ExtractorKind::Histogram);

        for key in ["FACEGATE_DATA_DIR", "FACEGATE_EXTRACTOR", "FACEGATE_FRAME_SKIP", "FACEGATE_TOLERANCE"] {
            std::env::remove_var(key);
        }
    }
}
