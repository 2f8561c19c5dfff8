use glance_hw::{CaptureRequest, Facing};
use std::path::PathBuf;

/// Application configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path of the user-facing camera (default: /dev/video0).
    pub camera_device: String,
    /// Ideal capture width; the device may negotiate another.
    pub camera_width: u32,
    /// Ideal capture height.
    pub camera_height: u32,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub landmark_model: String,
    /// Square input edge of the detector model.
    pub detector_input_size: usize,
    /// Minimum detector score for a face.
    pub detector_threshold: f32,
    /// Square input edge of the landmark model.
    pub landmark_input_size: usize,
    /// TOML file with the person and schedule to show. Built-in sample if unset.
    pub schedule_path: Option<PathBuf>,
    /// Directory for overlay PNG snapshots. Disabled if unset.
    pub overlay_dir: Option<PathBuf>,
    /// Write every Nth rendered overlay.
    pub overlay_every: u64,
}

impl Config {
    /// Load configuration from `GLANCE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("GLANCE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| glance_models::default_model_dir());

        Self {
            camera_device: std::env::var("GLANCE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            camera_width: env_parse("GLANCE_CAMERA_WIDTH", 640),
            camera_height: env_parse("GLANCE_CAMERA_HEIGHT", 480),
            model_dir,
            detector_model: std::env::var("GLANCE_DETECTOR_MODEL")
                .unwrap_or_else(|_| "face_detector.onnx".to_string()),
            landmark_model: std::env::var("GLANCE_LANDMARK_MODEL")
                .unwrap_or_else(|_| "face_landmarks.onnx".to_string()),
            detector_input_size: env_parse("GLANCE_DETECTOR_INPUT_SIZE", 128),
            detector_threshold: env_parse("GLANCE_DETECTOR_THRESHOLD", 0.5),
            landmark_input_size: env_parse("GLANCE_LANDMARK_INPUT_SIZE", 192),
            schedule_path: std::env::var("GLANCE_SCHEDULE_PATH").ok().map(PathBuf::from),
            overlay_dir: std::env::var("GLANCE_OVERLAY_DIR").ok().map(PathBuf::from),
            overlay_every: env_parse("GLANCE_OVERLAY_EVERY", 30u64).max(1),
        }
    }

    /// Stream constraints for the user-facing camera.
    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            width: self.camera_width,
            height: self.camera_height,
            facing: Facing::User,
        }
    }

    /// Path to the face detector model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(&self.detector_model)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the landmark model.
    pub fn landmark_model_path(&self) -> String {
        self.model_dir
            .join(&self.landmark_model)
            .to_string_lossy()
            .into_owned()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
