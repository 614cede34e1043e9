//! Pretrained face embedding extractor via ONNX Runtime.
//!
//! Runs an SFace-style recognition model on the face crop and returns a
//! 128-dimensional L2-normalized embedding, compared by Euclidean distance.

use crate::extractor::{DescriptorExtractor, ExtractError};
use crate::types::{Descriptor, ExtractorKind};
use image::imageops::FilterType;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const SFACE_INPUT_SIZE: usize = 112;

/// Length of an [`EmbeddingExtractor`] descriptor.
pub const EMBEDDING_DIM: usize = 128;

pub struct EmbeddingExtractor {
    session: Session,
}

impl EmbeddingExtractor {
    /// Load the recognition model from `model_path`.
    pub fn load(model_path: &Path) -> Result<Self, ExtractError> {
        if !model_path.exists() {
            return Err(ExtractError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session })
    }

    /// Resize to 112x112 and lay out as a 1x3xHxW tensor of raw intensities,
    /// replicating the gray channel into all three.
    fn preprocess(crop: &GrayImage) -> Array4<f32> {
        let size = SFACE_INPUT_SIZE as u32;
        let resized = image::imageops::resize(crop, size, size, FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, SFACE_INPUT_SIZE, SFACE_INPUT_SIZE));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let v = pixel[0] as f32;
            let (x, y) = (x as usize, y as usize);
            tensor[[0, 0, y, x]] = v;
            tensor[[0, 1, y, x]] = v;
            tensor[[0, 2, y, x]] = v;
        }
        tensor
    }
}

/// Validate the raw model output and L2-normalize it.
fn finish_embedding(raw: Vec<f32>) -> Result<Vec<f32>, ExtractError> {
    if raw.len() != EMBEDDING_DIM {
        return Err(ExtractError::Dimension {
            expected: EMBEDDING_DIM,
            actual: raw.len(),
        });
    }
    let mut values = raw;
    crate::imaging::l2_normalize(&mut values);
    Ok(values)
}

impl DescriptorExtractor for EmbeddingExtractor {
    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Embedding
    }

    fn extract(&mut self, crop: &GrayImage) -> Result<Descriptor, ExtractError> {
        let (width, height) = crop.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractError::EmptyCrop { width, height });
        }

        let input = Self::preprocess(crop);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ExtractError::InferenceFailed(format!("embedding output: {e}")))?;

        let values = finish_embedding(raw.to_vec())?;
        Ok(Descriptor::new(ExtractorKind::Embedding, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_preprocess_shape_and_channels() {
        let crop = GrayImage::from_fn(64, 80, |x, y| Luma([((x + y) % 256) as u8]));
        let tensor = EmbeddingExtractor::preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, SFACE_INPUT_SIZE, SFACE_INPUT_SIZE]);
        for y in (0..SFACE_INPUT_SIZE).step_by(7) {
            for x in (0..SFACE_INPUT_SIZE).step_by(5) {
                assert_eq!(tensor[[0, 0, y, x]], tensor[[0, 1, y, x]]);
                assert_eq!(tensor[[0, 1, y, x]], tensor[[0, 2, y, x]]);
            }
        }
    }

    #[test]
    fn test_preprocess_keeps_raw_intensity() {
        let crop = GrayImage::from_pixel(30, 30, Luma([200]));
        let tensor = EmbeddingExtractor::preprocess(&crop);
        assert_eq!(tensor[[0, 0, 50, 50]], 200.0);
    }

    #[test]
    fn test_finish_embedding_normalizes() {
        let mut raw = vec![0.0; EMBEDDING_DIM];
        raw[0] = 3.0;
        raw[1] = 4.0;
        let v = finish_embedding(raw).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_finish_embedding_rejects_wrong_length() {
        let err = finish_embedding(vec![1.0; 512]).unwrap_err();
        assert!(matches!(err, ExtractError::Dimension { expected: 128, actual: 512 }));
    }

    #[test]
    fn test_load_missing_model() {
        let err = EmbeddingExtractor::load(Path::new("/nonexistent/sface.onnx"))
            .err()
            .unwrap();
        assert!(matches!(err, ExtractError::ModelNotFound(_)));
    }
}
