//! The frame source seam shared by the camera and still-image backends.

use crate::frame::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("no frame within {0} ms")]
    Timeout(u64),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("source is not open")]
    NotOpen,
    #[error("no more frames")]
    Exhausted,
}

/// Something that yields grayscale frames one at a time.
///
/// `read` blocks for at most the source's configured timeout. Any error from
/// `read` is treated by callers as the end of the stream.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<(), CameraError>;

    fn read(&mut self) -> Result<Frame, CameraError>;

    /// Release the underlying device. Safe to call when not open.
    fn release(&mut self);

    fn is_open(&self) -> bool;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}
