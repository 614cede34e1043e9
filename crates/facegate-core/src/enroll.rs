//! Adding people to the gallery from a photo or a camera frame.

use crate::extractor::ExtractError;
use crate::gallery::{write_gallery, Added, GalleryError, GalleryStore, SharedGallery};
use crate::locator::{crop, expand, largest, CAPTURE_MARGIN};
use crate::pipeline::Pipeline;
use crate::types::Descriptor;
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("no face found in image")]
    NoFaceFound,
    #[error("multiple faces found ({0}); use an image with a single face")]
    MultipleFaces(usize),
    #[error("could not describe face: {0}")]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// Trimmed `name`, or `EmptyName` if nothing is left.
pub fn validate_name(name: &str) -> Result<&str, EnrollError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EnrollError::EmptyName);
    }
    Ok(name)
}

/// Descriptor of the single face in `image`.
pub fn describe_single_face(pipeline: &mut Pipeline, image: &GrayImage) -> Result<Descriptor, EnrollError> {
    let faces = pipeline.locate(image);
    let face = match faces.as_slice() {
        [] => return Err(EnrollError::NoFaceFound),
        [face] => *face,
        many => return Err(EnrollError::MultipleFaces(many.len())),
    };
    Ok(pipeline.describe(image, &face)?)
}

/// Enroll the single face in `image` under `name`.
///
/// The gallery is only touched once the image has yielded a descriptor.
pub fn enroll(
    pipeline: &mut Pipeline,
    store: &mut GalleryStore,
    name: &str,
    image: &GrayImage,
) -> Result<Added, EnrollError> {
    let name = validate_name(name)?;
    let descriptor = describe_single_face(pipeline, image)?;
    Ok(store.add(name, descriptor)?)
}

/// `enroll` against a gallery shared with a running session.
///
/// Detection and extraction run without the lock; the write lock is held
/// only for the insert and its persistence.
pub fn enroll_shared(
    pipeline: &mut Pipeline,
    gallery: &SharedGallery,
    name: &str,
    image: &GrayImage,
) -> Result<Added, EnrollError> {
    let name = validate_name(name)?;
    let descriptor = describe_single_face(pipeline, image)?;
    let added = write_gallery(gallery).add(name, descriptor)?;
    Ok(added)
}

/// Crop of the largest face in `frame` with a margin around it, suitable
/// as an enrollment photo. `None` when no face is visible.
pub fn capture_crop(pipeline: &mut Pipeline, frame: &GrayImage) -> Option<GrayImage> {
    let faces = pipeline.locate(frame);
    let face = largest(&faces)?;
    let (width, height) = frame.dimensions();
    let region = expand(face, CAPTURE_MARGIN, width, height);
    tracing::debug!(faces = faces.len(), x1 = region.x1, y1 = region.y1, "captured enrollment crop");
    Some(crop(frame, &region))
}
