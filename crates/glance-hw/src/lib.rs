//! glance-hw: Camera capture and the overlay surface faces are drawn on.
//!
//! Provides a V4L2-backed camera behind the [`VideoSource`] capability and an
//! in-memory RGB [`Overlay`] behind the [`Surface`] capability.

pub mod camera;
pub mod frame;
pub mod overlay;

pub use camera::{
    CameraError, CameraProvider, CaptureRequest, DeviceInfo, Facing, V4lCamera, V4lProvider,
    VideoSource,
};
pub use frame::Frame;
pub use overlay::{Overlay, Surface, SurfaceError, FACE_BOX_COLOR, FACE_BOX_WIDTH};
