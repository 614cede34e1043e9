//! facegate-hw — Frame sources.
//!
//! A V4L2 camera (YUYV, GREY or Y16, converted to 8-bit grayscale) and a
//! directory of still images, both behind the [`FrameSource`] trait.

pub mod camera;
pub mod frame;
pub mod source;
pub mod still;

pub use camera::{Camera, PixelFormat};
pub use frame::Frame;
pub use source::{CameraError, FrameSource};
pub use still::ImageSequence;
