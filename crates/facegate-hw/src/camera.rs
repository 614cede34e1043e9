//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use crate::source::{CameraError, FrameSource};
use std::path::Path;
use std::time::Duration;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const REQUESTED_WIDTH: u32 = 640;
const REQUESTED_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale (1 byte/pixel).
    Grey,
    /// 16-bit little-endian grayscale (2 bytes/pixel).
    Y16,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        if fourcc == FourCC::new(b"GREY") {
            Some(Self::Grey)
        } else if fourcc == FourCC::new(b"YUYV") {
            Some(Self::Yuyv)
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            Some(Self::Y16)
        } else {
            None
        }
    }
}

struct Streaming {
    // Declared first so the stream is torn down before the device handle.
    stream: MmapStream<'static>,
    _device: Device,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
}

/// V4L2 camera. Streaming starts on `open` and stops on `release` or drop.
pub struct Camera {
    device_path: String,
    read_timeout: Duration,
    streaming: Option<Streaming>,
}

impl Camera {
    pub fn new(device_path: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            device_path: device_path.into(),
            read_timeout,
            streaming: None,
        }
    }

    fn start(&self) -> Result<Streaming, CameraError> {
        let device_path = self.device_path.as_str();
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        // Ask for YUYV; grayscale-only sensors come back as GREY or Y16.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUESTED_WIDTH;
        fmt.height = REQUESTED_HEIGHT;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let pixel_format = PixelFormat::from_fourcc(negotiated.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {:?} (need YUYV, GREY, or Y16)",
                negotiated.fourcc
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "negotiated format"
        );

        let mut stream = MmapStream::with_buffers(&device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))?;
        stream.set_timeout(self.read_timeout);

        Ok(Streaming {
            stream,
            _device: device,
            width: negotiated.width,
            height: negotiated.height,
            pixel_format,
        })
    }
}

impl Streaming {
    /// Convert a raw buffer to grayscale based on the negotiated format.
    fn to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let converted = match self.pixel_format {
            PixelFormat::Grey => frame::grey_to_grayscale(buf, self.width, self.height),
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, self.width, self.height),
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height),
        };
        converted.map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }
}

impl FrameSource for Camera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.streaming.is_none() {
            self.streaming = Some(self.start()?);
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        let timeout_ms = self.read_timeout.as_millis() as u64;
        let streaming = self.streaming.as_mut().ok_or(CameraError::NotOpen)?;

        let (data, sequence) = {
            let (buf, meta) = streaming.stream.next().map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    CameraError::Timeout(timeout_ms)
                } else {
                    CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}"))
                }
            })?;
            (buf.to_vec(), meta.sequence)
        };
        let gray = streaming.to_grayscale(&data)?;

        Ok(Frame {
            data: gray,
            width: streaming.width,
            height: streaming.height,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }

    fn release(&mut self) {
        if self.streaming.take().is_some() {
            tracing::info!(device = %self.device_path, "camera released");
        }
    }

    fn is_open(&self) -> bool {
        self.streaming.is_some()
    }

    fn describe(&self) -> String {
        format!("camera {}", self.device_path)
    }
}
