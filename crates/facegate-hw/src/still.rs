//! Replay a directory of still images as a frame source.

use crate::frame::Frame;
use crate::source::{CameraError, FrameSource};
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "ppm"];

/// Images in a directory, read in file-name order. Running out of images
/// is reported as [`CameraError::Exhausted`].
pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageSequence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            next: 0,
            open: false,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn open(&mut self) -> Result<(), CameraError> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| CameraError::DeviceNotFound(format!("{}: {e}", self.dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::DeviceNotFound(format!(
                "{}: no images",
                self.dir.display()
            )));
        }

        tracing::info!(dir = %self.dir.display(), frames = files.len(), "opened image sequence");
        self.files = files;
        self.next = 0;
        self.open = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::NotOpen);
        }
        let path = self.files.get(self.next).ok_or(CameraError::Exhausted)?;
        let image = image::open(path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", path.display())))?
            .to_luma8();
        let sequence = self.next as u32;
        self.next += 1;
        Ok(Frame::from_image(image, sequence))
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("images in {}", self.dir.display())
    }
}
