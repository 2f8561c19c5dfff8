//! Camera capability and its V4L2 implementation via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Front camera, pointed at the user.
    User,
    /// Rear camera.
    Environment,
}

/// Stream constraints. Width and height are ideals; the device may negotiate
/// something else, reported back through [`VideoSource::resolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing: Facing::User,
        }
    }
}

/// A running video stream.
pub trait VideoSource {
    /// Native resolution of the stream.
    fn resolution(&self) -> (u32, u32);

    /// Fetch the next frame. `Ok(None)` means the source does not yet have
    /// enough buffered data for a full frame.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Stop all tracks. Further `next_frame` calls restart the stream.
    fn stop(&mut self);
}

/// Opens video streams on request.
pub trait CameraProvider {
    type Source: VideoSource;

    fn open(&mut self, request: &CaptureRequest) -> Result<Self::Source, CameraError>;
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Packed RGB888 (3 bytes/pixel).
    Rgb3,
}

impl PixelFormat {
    fn frame_bytes(&self, width: u32, height: u32) -> usize {
        let bpp = match self {
            PixelFormat::Yuyv => 2,
            PixelFormat::Rgb3 => 3,
        };
        (width * height) as usize * bpp
    }
}

/// V4L2 camera device handle.
pub struct V4lCamera {
    device: Device,
    stream: Option<MmapStream<'static>>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl V4lCamera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0") and negotiate
    /// the requested resolution.
    pub fn open(device_path: &str, request: &CaptureRequest) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                CameraError::PermissionDenied(device_path.to_string())
            } else if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
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

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = request.width;
        fmt.height = request.height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"RGB3") {
            PixelFormat::Rgb3
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV or RGB3)"
            )));
        };

        tracing::info!(
            requested_width = request.width,
            requested_height = request.height,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            stream: None,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl VideoSource for V4lCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        if self.stream.is_none() {
            let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
                .map_err(|e| {
                    CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
                })?;
            tracing::debug!(device = %self.device_path, "stream started");
            self.stream = Some(stream);
        }

        let (width, height, pixel_format) = (self.width, self.height, self.pixel_format);
        let expected = pixel_format.frame_bytes(width, height);

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CameraError::CaptureFailed("stream not started".into()))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        // Partially filled buffers are skipped rather than drawn torn.
        let used = (meta.bytesused as usize).min(buf.len());
        if used < expected {
            tracing::trace!(seq = meta.sequence, used, expected, "short buffer");
            return Ok(None);
        }

        let rgb = match pixel_format {
            PixelFormat::Rgb3 => buf[..expected].to_vec(),
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, width, height)
                .map_err(|e| CameraError::CaptureFailed(format!("YUYV conversion failed: {e}")))?,
        };

        Frame::from_rgb(rgb, width, height, meta.sequence)
            .map(Some)
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!(device = %self.device_path, "camera stream stopped");
        }
    }
}

impl Drop for V4lCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens [`V4lCamera`]s on a fixed device path.
///
/// V4L2 exposes no facing information, so the configured device is taken to
/// be the user-facing camera and [`Facing::Environment`] requests are refused.
pub struct V4lProvider {
    device_path: String,
}

impl V4lProvider {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }
}

impl CameraProvider for V4lProvider {
    type Source = V4lCamera;

    fn open(&mut self, request: &CaptureRequest) -> Result<V4lCamera, CameraError> {
        if request.facing != Facing::User {
            return Err(CameraError::DeviceNotFound(format!(
                "no {:?}-facing camera configured",
                request.facing
            )));
        }
        V4lCamera::open(&self.device_path, request)
    }
}
