use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name reported for a face that matched no enrolled identity.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Axis-aligned face box in source-frame pixel coordinates.
///
/// `(x1, y1)` is the top-left corner (inclusive), `(x2, y2)` the bottom-right
/// corner (exclusive). Detector output may extend past the frame; callers
/// clamp with [`FaceRegion::clamp_to`] before cropping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// Detection confidence; 1.0 for detectors without a score.
    pub confidence: f32,
}

impl FaceRegion {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> Self {
        Self { x1, y1, x2, y2, confidence }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    /// Width over height; 0.0 for a degenerate box.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height() == 0 {
            0.0
        } else {
            self.width() as f32 / self.height() as f32
        }
    }

    /// Intersect with a `width` x `height` frame. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceRegion> {
        let w = width as i32;
        let h = height as i32;
        let clamped = FaceRegion {
            x1: self.x1.clamp(0, w),
            y1: self.y1.clamp(0, h),
            x2: self.x2.clamp(0, w),
            y2: self.y2.clamp(0, h),
            confidence: self.confidence,
        };
        (clamped.area() > 0).then_some(clamped)
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &FaceRegion) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0) as f32 * (iy2 - iy1).max(0) as f32;
        let union = self.area() as f32 + other.area() as f32 - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Which extractor family produced a descriptor.
///
/// Descriptors of different kinds are never compared with each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    /// Hand-rolled intensity + LBP + gradient histograms (576-d, cosine).
    Histogram,
    /// Pretrained face embedding model (128-d, Euclidean).
    Embedding,
}

impl ExtractorKind {
    /// Descriptor length produced by this extractor.
    pub fn dimension(self) -> usize {
        match self {
            ExtractorKind::Histogram => crate::extractor::HISTOGRAM_DESCRIPTOR_DIM,
            ExtractorKind::Embedding => crate::embedding::EMBEDDING_DIM,
        }
    }

    /// Default acceptance threshold on the matcher's score scale.
    pub fn default_threshold(self) -> f32 {
        match self {
            ExtractorKind::Histogram => crate::matcher::DEFAULT_COSINE_THRESHOLD,
            ExtractorKind::Embedding => crate::matcher::DEFAULT_EUCLIDEAN_THRESHOLD,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExtractorKind::Histogram => "histogram",
            ExtractorKind::Embedding => "embedding",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "histogram" | "lbp" => Ok(ExtractorKind::Histogram),
            "embedding" | "sface" => Ok(ExtractorKind::Embedding),
            other => Err(format!("unknown extractor '{other}' (expected histogram or embedding)")),
        }
    }
}

/// Fixed-length face descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub values: Vec<f32>,
    pub kind: ExtractorKind,
}

impl Descriptor {
    pub fn new(kind: ExtractorKind, values: Vec<f32>) -> Self {
        Self { values, kind }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// A zero vector is similar to nothing (0.0).
    pub fn similarity(&self, other: &Descriptor) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Outcome of matching one probe against the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Matched identity, or [`UNKNOWN_NAME`].
    pub name: String,
    /// Score of the accepted candidate; 0.0 when nothing matched.
    pub confidence: f32,
    pub access_granted: bool,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_NAME.to_string(),
            confidence: 0.0,
            access_granted: false,
        }
    }

    pub fn granted(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence,
            access_granted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist(values: Vec<f32>) -> Descriptor {
        Descriptor::new(ExtractorKind::Histogram, values)
    }

    #[test]
    fn test_similarity_identical() {
        let a = hist(vec![0.3, 0.1, 0.9]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = hist(vec![1.0, 0.0]);
        let b = hist(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = hist(vec![0.0, 0.0]);
        let b = hist(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_euclidean_self_distance_is_zero() {
        let a = Descriptor::new(ExtractorKind::Embedding, vec![0.5, -0.5, 0.25]);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Descriptor::new(ExtractorKind::Embedding, vec![0.0, 0.0]);
        let b = Descriptor::new(ExtractorKind::Embedding, vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_region_geometry() {
        let r = FaceRegion::new(10, 20, 90, 120, 1.0);
        assert_eq!(r.width(), 80);
        assert_eq!(r.height(), 100);
        assert_eq!(r.area(), 8000);
        assert!((r.aspect_ratio() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_region_clamp() {
        let r = FaceRegion::new(-10, -5, 50, 40, 0.9);
        let c = r.clamp_to(30, 30).unwrap();
        assert_eq!((c.x1, c.y1, c.x2, c.y2), (0, 0, 30, 30));
        assert!(FaceRegion::new(40, 40, 60, 60, 1.0).clamp_to(30, 30).is_none());
    }

    #[test]
    fn test_region_iou() {
        let a = FaceRegion::new(0, 0, 10, 10, 1.0);
        let b = FaceRegion::new(5, 0, 15, 10, 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&FaceRegion::new(20, 20, 30, 30, 1.0)), 0.0);
    }

    #[test]
    fn test_extractor_kind_parse() {
        assert_eq!("histogram".parse::<ExtractorKind>(), Ok(ExtractorKind::Histogram));
        assert_eq!(" Embedding ".parse::<ExtractorKind>(), Ok(ExtractorKind::Embedding));
        assert!("haar".parse::<ExtractorKind>().is_err());
    }

    #[test]
    fn test_extractor_kind_serde() {
        let json = serde_json::to_string(&ExtractorKind::Embedding).unwrap();
        assert_eq!(json, "\"embedding\"");
    }
}
