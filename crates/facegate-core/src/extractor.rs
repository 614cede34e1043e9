//! Descriptor extraction: the extractor seam and the hand-rolled histogram extractor.

use crate::config::Config;
use crate::embedding::EmbeddingExtractor;
use crate::imaging;
use crate::types::{Descriptor, ExtractorKind};
use image::GrayImage;
use thiserror::Error;

const INTENSITY_BINS: usize = 256;
const LBP_BINS: usize = 256;
const GRADIENT_BINS: usize = 64;

/// Length of a [`HistogramExtractor`] descriptor.
pub const HISTOGRAM_DESCRIPTOR_DIM: usize = INTENSITY_BINS + LBP_BINS + GRADIENT_BINS;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("face crop is empty ({width}x{height})")]
    EmptyCrop { width: u32, height: u32 },
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("expected {expected}-dim descriptor, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Turns a grayscale face crop into a fixed-length descriptor.
///
/// Every descriptor an extractor returns has length `kind().dimension()`;
/// a crop it cannot handle is an error, never a short vector.
pub trait DescriptorExtractor: Send {
    fn kind(&self) -> ExtractorKind;

    fn extract(&mut self, crop: &GrayImage) -> Result<Descriptor, ExtractError>;
}

/// Build the extractor selected by `config.extractor`.
pub fn build_extractor(config: &Config) -> Result<Box<dyn DescriptorExtractor>, ExtractError> {
    match config.extractor {
        ExtractorKind::Histogram => Ok(Box::new(HistogramExtractor)),
        ExtractorKind::Embedding => {
            let path = config.embedding_model_path();
            Ok(Box::new(EmbeddingExtractor::load(&path)?))
        }
    }
}

/// Intensity, LBP texture and gradient-magnitude histograms of an
/// equalized 100x100 face, each L2-normalized, concatenated (576 values).
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramExtractor;

impl HistogramExtractor {
    fn features(face: &GrayImage) -> Vec<f32> {
        let mut intensity = imaging::histogram(face.as_raw().iter().copied(), INTENSITY_BINS);
        imaging::l2_normalize(&mut intensity);

        let mut texture = imaging::histogram(imaging::lbp_codes(face), LBP_BINS);
        imaging::l2_normalize(&mut texture);

        // Magnitudes above 255 saturate into the top bin.
        let magnitudes = imaging::sobel_magnitude(face)
            .into_iter()
            .map(|m| m.clamp(0.0, 255.0) as u8);
        let mut gradient = imaging::histogram(magnitudes, GRADIENT_BINS);
        imaging::l2_normalize(&mut gradient);

        let mut out = Vec::with_capacity(HISTOGRAM_DESCRIPTOR_DIM);
        out.extend(intensity);
        out.extend(texture);
        out.extend(gradient);
        out
    }
}

impl DescriptorExtractor for HistogramExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Histogram
    }

    fn extract(&mut self, crop: &GrayImage) -> Result<Descriptor, ExtractError> {
        let (width, height) = crop.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractError::EmptyCrop { width, height });
        }

        let mut face = imaging::canonical_face(crop);
        imaging::equalize_histogram(&mut face);

        let values = Self::features(&face);
        if values.len() != HISTOGRAM_DESCRIPTOR_DIM {
            return Err(ExtractError::Dimension {
                expected: HISTOGRAM_DESCRIPTOR_DIM,
                actual: values.len(),
            });
        }

        Ok(Descriptor::new(ExtractorKind::Histogram, values))
    }
}
