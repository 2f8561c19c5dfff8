//! Read-only view state and terminal presentation.

use glance_core::{Alert, Emotion, Meeting, Person};
use serde::Serialize;

pub const MODEL_LOAD_MESSAGE: &str =
    "Failed to load face detection models. Please refresh the page and try again.";
pub const CAMERA_ACCESS_MESSAGE: &str =
    "Could not access camera. Please ensure camera permissions are granted.";
pub const DETECTION_CYCLE_MESSAGE: &str = "Face detection error occurred. Please refresh the page.";
pub const NO_PERSON_MESSAGE: &str =
    "No person recognized. Please start the camera and look directly at it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Loading,
    Ready,
    Failed,
}

/// The alert as the view shows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    pub emotion: Emotion,
    pub confidence: f32,
    pub confidence_percent: i32,
    pub message: String,
    /// Badge colour as `#rrggbb`.
    pub color: String,
}

impl From<&Alert> for AlertView {
    fn from(alert: &Alert) -> Self {
        let [r, g, b] = alert.emotion.badge_color();
        Self {
            emotion: alert.emotion,
            confidence: alert.confidence,
            confidence_percent: alert.confidence_percent(),
            message: alert.message(),
            color: format!("#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

/// Snapshot of the engine state, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub models: ModelState,
    pub detecting: bool,
    pub start_enabled: bool,
    pub start_label: &'static str,
    pub alert: Option<AlertView>,
    pub error: Option<String>,
    /// Frames drawn since the engine started.
    pub frames: u64,
}

impl Default for ViewSnapshot {
    fn default() -> Self {
        Self {
            models: ModelState::Loading,
            detecting: false,
            start_enabled: false,
            start_label: start_label(ModelState::Loading),
            alert: None,
            error: None,
            frames: 0,
        }
    }
}

pub fn start_label(models: ModelState) -> &'static str {
    match models {
        ModelState::Loading => "Loading Models...",
        ModelState::Ready | ModelState::Failed => "Start Camera",
    }
}

/// One-line alert banner: "Happy detected! (Confidence: 97%)".
pub fn render_alert(alert: &AlertView) -> String {
    format!("{} (Confidence: {}%)", alert.message, alert.confidence_percent)
}

/// Person card followed by the schedule, or the "no person" notice.
pub fn render_person(person: Option<&Person>) -> String {
    let Some(person) = person else {
        return format!("{NO_PERSON_MESSAGE}\n");
    };

    let mut out = String::new();
    out.push_str(&format!("{}\n{}\n\n", person.name, person.role));
    out.push_str(&render_schedule(&person.schedule));
    out
}

/// Meetings in the order given, each with a 12-hour time range.
pub fn render_schedule(meetings: &[Meeting]) -> String {
    let mut out = String::from("Today's Schedule\n");
    for meeting in meetings {
        out.push('\n');
        out.push_str(&format!("  {}\n", meeting.time_range()));
        out.push_str(&format!("  {}\n", meeting.title));
        out.push_str(&format!("  {}\n", meeting.description));
        out.push_str(&format!("  @ {}\n", meeting.location));
    }
    out
}
