//! Person and meeting records shown next to the camera view.
//!
//! These are externally supplied and never derived from detection output.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse schedule: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    /// Local wall-clock time, e.g. `2024-03-15T09:00:00`.
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub description: String,
    pub location: String,
}

impl Meeting {
    /// Start and end on a 12-hour clock: "9:00 AM - 9:30 AM".
    pub fn time_range(&self) -> String {
        format!("{} - {}", clock_12h(&self.start_time), clock_12h(&self.end_time))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub role: String,
    pub image_url: String,
    /// Rendered in the order given; never re-sorted.
    #[serde(default)]
    pub schedule: Vec<Meeting>,
}

#[derive(Deserialize)]
struct ScheduleFile {
    person: Person,
}

impl Person {
    /// Parse a person from TOML with a `[person]` table and `[[person.schedule]]` entries.
    pub fn from_toml(text: &str) -> Result<Self, ScheduleError> {
        let file: ScheduleFile = toml::from_str(text)?;
        Ok(file.person)
    }

    pub fn load(path: &Path) -> Result<Self, ScheduleError> {
        let text = std::fs::read_to_string(path)?;
        let person = Self::from_toml(&text)?;
        tracing::info!(
            path = %path.display(),
            person = %person.name,
            meetings = person.schedule.len(),
            "schedule loaded"
        );
        Ok(person)
    }

    /// Built-in sample data used when no schedule file is configured.
    pub fn sample() -> Self {
        Self {
            id: "1".into(),
            name: "John Doe".into(),
            role: "Software Engineer".into(),
            image_url: "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?auto=format&fit=crop&q=80".into(),
            schedule: vec![
                Meeting {
                    id: "1".into(),
                    title: "Team Standup".into(),
                    start_time: at(2024, 3, 15, 9, 0),
                    end_time: at(2024, 3, 15, 9, 30),
                    description: "Daily team sync meeting".into(),
                    location: "Conference Room A".into(),
                },
                Meeting {
                    id: "2".into(),
                    title: "Project Review".into(),
                    start_time: at(2024, 3, 15, 11, 0),
                    end_time: at(2024, 3, 15, 12, 0),
                    description: "Q1 project progress review".into(),
                    location: "Virtual Meeting".into(),
                },
            ],
        }
    }
}

fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap_or_default()
}

/// Format a time as "h:mm AM" without a leading zero on the hour.
pub fn clock_12h(t: &NaiveDateTime) -> String {
    t.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_12h() {
        assert_eq!(clock_12h(&at(2024, 3, 15, 9, 0)), "9:00 AM");
        assert_eq!(clock_12h(&at(2024, 3, 15, 12, 0)), "12:00 PM");
        assert_eq!(clock_12h(&at(2024, 3, 15, 0, 5)), "12:05 AM");
        assert_eq!(clock_12h(&at(2024, 3, 15, 23, 45)), "11:45 PM");
    }

    #[test]
    fn test_sample_time_ranges() {
        let person = Person::sample();
        let ranges: Vec<String> = person.schedule.iter().map(Meeting::time_range).collect();
        assert_eq!(ranges, vec!["9:00 AM - 9:30 AM", "11:00 AM - 12:00 PM"]);
    }

    #[test]
    fn test_from_toml_keeps_order() {
        let text = r#"
[person]
id = "7"
name = "Ada"
role = "Researcher"
image_url = "https://example.com/ada.jpg"

[[person.schedule]]
id = "b"
title = "Late"
start_time = "2024-03-15T16:00:00"
end_time = "2024-03-15T17:00:00"
description = "Afternoon sync"
location = "Room 2"

[[person.schedule]]
id = "a"
title = "Early"
start_time = "2024-03-15T08:00:00"
end_time = "2024-03-15T08:15:00"
description = "Coffee"
location = "Kitchen"
"#;
        let person = Person::from_toml(text).unwrap();
        assert_eq!(person.name, "Ada");
        let titles: Vec<&str> = person.schedule.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Late", "Early"]);
        assert_eq!(person.schedule[1].time_range(), "8:00 AM - 8:15 AM");
    }

    #[test]
    fn test_from_toml_without_schedule() {
        let text = r#"
[person]
id = "1"
name = "Solo"
role = "Guest"
image_url = ""
"#;
        let person = Person::from_toml(text).unwrap();
        assert!(person.schedule.is_empty());
    }

    #[test]
    fn test_from_toml_bad_time() {
        let text = r#"
[person]
id = "1"
name = "X"
role = "Y"
image_url = ""

[[person.schedule]]
id = "1"
title = "T"
start_time = "nine o'clock"
end_time = "2024-03-15T09:30:00"
description = ""
location = ""
"#;
        assert!(matches!(Person::from_toml(text), Err(ScheduleError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Person::load(Path::new("/nonexistent/glance/schedule.toml")).unwrap_err();
        assert!(matches!(err, ScheduleError::Io(_)));
    }
}
