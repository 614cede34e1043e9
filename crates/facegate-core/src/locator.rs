//! Face location: detector output filtered into plausible face regions.

use crate::config::Config;
use crate::detector::{DetectorError, FaceDetector, ScrfdDetector};
use crate::types::FaceRegion;
use image::GrayImage;

pub const DEFAULT_MIN_FACE_PX: u32 = 60;
pub const DEFAULT_MIN_ASPECT: f32 = 0.7;
pub const DEFAULT_MAX_ASPECT: f32 = 1.4;

/// Share of the box size added on every side of an enrollment capture.
pub const CAPTURE_MARGIN: f32 = 0.4;

/// Rejects detections that are too small or not face-shaped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
    pub min_size: u32,
    pub min_aspect: f32,
    pub max_aspect: f32,
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_FACE_PX,
            min_aspect: DEFAULT_MIN_ASPECT,
            max_aspect: DEFAULT_MAX_ASPECT,
        }
    }
}

impl RegionFilter {
    pub fn accepts(&self, region: &FaceRegion) -> bool {
        let min = self.min_size as i32;
        if region.width() < min || region.height() < min {
            return false;
        }
        let aspect = region.aspect_ratio();
        aspect >= self.min_aspect && aspect <= self.max_aspect
    }
}

/// Detector plus region filter. Never fails: a detector error yields no faces.
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    filter: RegionFilter,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector,
            filter: RegionFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: RegionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Face regions in `frame`, clamped to its bounds. Order is unspecified.
    pub fn locate(&mut self, frame: &GrayImage) -> Vec<FaceRegion> {
        let (width, height) = frame.dimensions();
        let raw = match self.detector.detect(frame) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "face detection failed; treating frame as empty");
                return Vec::new();
            }
        };

        let total = raw.len();
        let faces: Vec<FaceRegion> = raw
            .into_iter()
            .filter_map(|r| r.clamp_to(width, height))
            .filter(|r| self.filter.accepts(r))
            .collect();

        if faces.len() != total {
            tracing::trace!(detected = total, kept = faces.len(), "filtered face candidates");
        }
        faces
    }
}

/// Build the SCRFD-backed locator described by `config`.
pub fn build_locator(config: &Config) -> Result<FaceLocator, DetectorError> {
    let detector = ScrfdDetector::load(&config.detector_model_path())?;
    Ok(FaceLocator::new(Box::new(detector)).with_filter(RegionFilter {
        min_size: config.min_face_px,
        ..RegionFilter::default()
    }))
}

/// Copy the pixels under `region` (clamped to the frame).
///
/// A region entirely outside the frame yields an empty image.
pub fn crop(frame: &GrayImage, region: &FaceRegion) -> GrayImage {
    let (width, height) = frame.dimensions();
    match region.clamp_to(width, height) {
        Some(r) => image::imageops::crop_imm(
            frame,
            r.x1 as u32,
            r.y1 as u32,
            r.width() as u32,
            r.height() as u32,
        )
        .to_image(),
        None => GrayImage::new(0, 0),
    }
}

/// Region with the largest area; the earliest wins ties.
pub fn largest(regions: &[FaceRegion]) -> Option<&FaceRegion> {
    regions.iter().fold(None, |best: Option<&FaceRegion>, r| match best {
        Some(b) if b.area() >= r.area() => Some(b),
        _ => Some(r),
    })
}

/// Grow `region` by `margin` of its width/height on each side, clamped to the frame.
pub fn expand(region: &FaceRegion, margin: f32, width: u32, height: u32) -> FaceRegion {
    let dx = (region.width() as f32 * margin) as i32;
    let dy = (region.height() as f32 * margin) as i32;
    FaceRegion {
        x1: (region.x1 - dx).max(0),
        y1: (region.y1 - dy).max(0),
        x2: (region.x2 + dx).min(width as i32),
        y2: (region.y2 + dy).min(height as i32),
        confidence: region.confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    struct FixedDetector(Vec<FaceRegion>);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenDetector;

    impl FaceDetector for BrokenDetector {
        fn detect(&mut self, _frame: &GrayImage) -> Result<Vec<FaceRegion>, DetectorError> {
            Err(DetectorError::InferenceFailed("boom".into()))
        }
    }

    fn frame() -> GrayImage {
        GrayImage::from_fn(320, 240, |x, y| Luma([((x ^ y) & 0xff) as u8]))
    }

    #[test]
    fn test_filter_min_size() {
        let f = RegionFilter::default();
        assert!(f.accepts(&FaceRegion::new(0, 0, 60, 60, 1.0)));
        assert!(!f.accepts(&FaceRegion::new(0, 0, 59, 59, 1.0)));
        assert!(!f.accepts(&FaceRegion::new(0, 0, 80, 59, 1.0)));
    }

    #[test]
    fn test_filter_aspect_band() {
        let f = RegionFilter::default();
        assert!(f.accepts(&FaceRegion::new(0, 0, 70, 100, 1.0)));
        assert!(f.accepts(&FaceRegion::new(0, 0, 140, 100, 1.0)));
        assert!(!f.accepts(&FaceRegion::new(0, 0, 69, 100, 1.0)));
        assert!(!f.accepts(&FaceRegion::new(0, 0, 141, 100, 1.0)));
    }

    #[test]
    fn test_locate_filters_and_clamps() {
        let mut locator = FaceLocator::new(Box::new(FixedDetector(vec![
            FaceRegion::new(10, 10, 90, 100, 0.9),
            FaceRegion::new(0, 0, 20, 20, 0.9),
            FaceRegion::new(0, 0, 200, 60, 0.9),
            FaceRegion::new(260, 180, 400, 300, 0.8),
        ])));
        let faces = locator.locate(&frame());
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0], FaceRegion::new(10, 10, 90, 100, 0.9));
        assert_eq!(faces[1], FaceRegion::new(260, 180, 320, 240, 0.8));
    }

    #[test]
    fn test_locate_swallows_detector_errors() {
        let mut locator = FaceLocator::new(Box::new(BrokenDetector));
        assert!(locator.locate(&frame()).is_empty());
    }

    #[test]
    fn test_crop_dimensions() {
        let c = crop(&frame(), &FaceRegion::new(10, 20, 90, 120, 1.0));
        assert_eq!(c.dimensions(), (80, 100));
        assert_eq!(c.get_pixel(0, 0)[0], ((10u32 ^ 20) & 0xff) as u8);
    }

    #[test]
    fn test_crop_outside_frame_is_empty() {
        let c = crop(&frame(), &FaceRegion::new(400, 400, 500, 500, 1.0));
        assert_eq!(c.dimensions(), (0, 0));
    }

    #[test]
    fn test_largest() {
        let regions = vec![
            FaceRegion::new(0, 0, 60, 60, 1.0),
            FaceRegion::new(0, 0, 90, 90, 1.0),
            FaceRegion::new(100, 100, 190, 190, 1.0),
        ];
        assert_eq!(largest(&regions), Some(&regions[1]));
        assert_eq!(largest(&[]), None);
    }

    #[test]
    fn test_expand_clamps_to_frame() {
        let r = FaceRegion::new(10, 50, 110, 150, 1.0);
        let e = expand(&r, CAPTURE_MARGIN, 320, 240);
        assert_eq!((e.x1, e.y1, e.x2, e.y2), (0, 10, 150, 190));
    }
}
