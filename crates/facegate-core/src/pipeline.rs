//! Locator and extractor bundled as one recognition front end.

use crate::config::Config;
use crate::detector::DetectorError;
use crate::extractor::{build_extractor, DescriptorExtractor, ExtractError};
use crate::locator::{build_locator, crop, FaceLocator};
use crate::types::{Descriptor, ExtractorKind, FaceRegion};
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("face detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("descriptor extractor: {0}")]
    Extractor(#[from] ExtractError),
}

pub struct Pipeline {
    locator: FaceLocator,
    extractor: Box<dyn DescriptorExtractor>,
}

impl Pipeline {
    pub fn new(locator: FaceLocator, extractor: Box<dyn DescriptorExtractor>) -> Self {
        Self { locator, extractor }
    }

    /// Load the detector and the configured extractor.
    pub fn build(config: &Config) -> Result<Self, PipelineError> {
        let locator = build_locator(config)?;
        let extractor = build_extractor(config)?;
        tracing::info!(extractor = %extractor.kind(), "recognition pipeline ready");
        Ok(Self::new(locator, extractor))
    }

    pub fn kind(&self) -> ExtractorKind {
        self.extractor.kind()
    }

    pub fn locate(&mut self, frame: &GrayImage) -> Vec<FaceRegion> {
        self.locator.locate(frame)
    }

    /// Descriptor of the face under `region`.
    pub fn describe(&mut self, frame: &GrayImage, region: &FaceRegion) -> Result<Descriptor, ExtractError> {
        self.extractor.extract(&crop(frame, region))
    }
}
