//! glance-core: Emotion heuristics and schedule data for the Glance demo.
//!
//! Face detection and landmark estimation are delegated to external models
//! (see `glance-models`). This crate holds the pure logic that runs on their
//! output: a landmark-distance emotion classifier and the debouncer that
//! decides when an emotion is surfaced to the user.

pub mod alert;
pub mod classifier;
pub mod landmarks;
pub mod schedule;
pub mod types;

pub use alert::{Alert, AlertChange, AlertDebouncer, ALERT_DISPLAY};
pub use classifier::{classify, LandmarkFeatures};
pub use landmarks::{Keypoint, LandmarkSet};
pub use schedule::{Meeting, Person, ScheduleError};
pub use types::{BoundingBox, Classification, Emotion};
