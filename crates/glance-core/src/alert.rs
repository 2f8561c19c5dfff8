//! Alert debouncing for classifier output.
//!
//! A single alert slot (`Idle` or `Showing`). A non-neutral classification
//! raises an alert when the slot is idle or the shown alert is older than
//! [`ALERT_DISPLAY`]. Independently, the shown alert is cleared exactly
//! [`ALERT_DISPLAY`] after it was raised.
//!
//! Both paths take `&mut self`, so the owner must drive them from one thread.
//! When both are due at the same instant, call [`AlertDebouncer::expire`]
//! before [`AlertDebouncer::offer`].

use crate::types::{Classification, Emotion};
use std::time::{Duration, Instant};

/// How long an alert stays visible, and the cooldown before it can be replaced.
pub const ALERT_DISPLAY: Duration = Duration::from_millis(2000);

/// A user-visible emotion alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    pub emotion: Emotion,
    pub confidence: f32,
    pub created_at: Instant,
}

impl Alert {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Headline shown to the user, e.g. "Happy detected!".
    pub fn message(&self) -> String {
        format!("{} detected!", self.emotion.title())
    }

    pub fn confidence_percent(&self) -> i32 {
        (self.confidence * 100.0).round() as i32
    }
}

/// Outcome of offering a classification or servicing the timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertChange {
    Raised(Alert),
    Cleared(Alert),
    Unchanged,
}

/// Single-slot alert debouncer with a fixed display timer.
#[derive(Debug)]
pub struct AlertDebouncer {
    current: Option<Alert>,
    display: Duration,
}

impl Default for AlertDebouncer {
    fn default() -> Self {
        Self::new(ALERT_DISPLAY)
    }
}

impl AlertDebouncer {
    pub fn new(display: Duration) -> Self {
        Self {
            current: None,
            display,
        }
    }

    /// The alert currently shown, if any.
    pub fn current(&self) -> Option<&Alert> {
        self.current.as_ref()
    }

    /// When the shown alert's timer fires. Raising a new alert moves the
    /// deadline, which invalidates the previous one.
    pub fn deadline(&self) -> Option<Instant> {
        self.current.map(|a| a.created_at + self.display)
    }

    /// Offer a classification produced at `now`.
    pub fn offer(&mut self, classification: &Classification, now: Instant) -> AlertChange {
        if classification.emotion == Emotion::Neutral {
            return AlertChange::Unchanged;
        }

        if let Some(current) = &self.current {
            if current.age(now) <= self.display {
                tracing::trace!(
                    emotion = %classification.emotion,
                    shown = %current.emotion,
                    "alert suppressed"
                );
                return AlertChange::Unchanged;
            }
        }

        let alert = Alert {
            emotion: classification.emotion,
            confidence: classification.confidence,
            created_at: now,
        };
        self.current = Some(alert);

        tracing::debug!(
            emotion = %alert.emotion,
            confidence = alert.confidence,
            "alert raised"
        );
        AlertChange::Raised(alert)
    }

    /// Service the display timer: clear the alert once its deadline has passed.
    pub fn expire(&mut self, now: Instant) -> AlertChange {
        match self.deadline() {
            Some(deadline) if now >= deadline => match self.current.take() {
                Some(alert) => {
                    tracing::debug!(emotion = %alert.emotion, "alert cleared");
                    AlertChange::Cleared(alert)
                }
                None => AlertChange::Unchanged,
            },
            _ => AlertChange::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn happy() -> Classification {
        Classification {
            emotion: Emotion::Happy,
            confidence: 0.9,
        }
    }

    fn neutral() -> Classification {
        Classification {
            emotion: Emotion::Neutral,
            confidence: 0.6,
        }
    }

    /// Feed one event the way the engine does: timer first, then the offer.
    fn step(d: &mut AlertDebouncer, c: &Classification, now: Instant) -> AlertChange {
        d.expire(now);
        d.offer(c, now)
    }

    #[test]
    fn test_raise_from_idle() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        let change = d.offer(&happy(), t0);
        assert!(matches!(change, AlertChange::Raised(a) if a.created_at == t0));
        assert_eq!(d.deadline(), Some(t0 + ms(2000)));
    }

    #[test]
    fn test_repeat_within_window_suppressed() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();

        let raised: Vec<Instant> = [0, 500, 2500]
            .iter()
            .filter_map(|&offset| match step(&mut d, &happy(), t0 + ms(offset)) {
                AlertChange::Raised(a) => Some(a.created_at),
                _ => None,
            })
            .collect();

        assert_eq!(raised, vec![t0, t0 + ms(2500)]);
    }

    #[test]
    fn test_suppressed_offer_does_not_move_deadline() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        d.offer(&happy(), t0);
        let sad = Classification {
            emotion: Emotion::Sad,
            confidence: 0.8,
        };
        assert_eq!(d.offer(&sad, t0 + ms(1500)), AlertChange::Unchanged);
        assert_eq!(d.current().unwrap().emotion, Emotion::Happy);
        assert_eq!(d.deadline(), Some(t0 + ms(2000)));
    }

    #[test]
    fn test_neutral_never_raises() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        assert_eq!(d.offer(&neutral(), t0), AlertChange::Unchanged);
        assert!(d.current().is_none());
    }

    #[test]
    fn test_neutral_does_not_clear_early() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        d.offer(&happy(), t0);

        assert_eq!(step(&mut d, &neutral(), t0 + ms(1000)), AlertChange::Unchanged);
        assert!(d.current().is_some());
        assert_eq!(d.expire(t0 + ms(1999)), AlertChange::Unchanged);
        assert!(d.current().is_some());

        assert!(matches!(d.expire(t0 + ms(2000)), AlertChange::Cleared(_)));
        assert!(d.current().is_none());
    }

    #[test]
    fn test_expire_when_idle() {
        let mut d = AlertDebouncer::default();
        assert_eq!(d.expire(Instant::now()), AlertChange::Unchanged);
        assert!(d.deadline().is_none());
    }

    #[test]
    fn test_offer_at_exact_deadline_after_expire() {
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        d.offer(&happy(), t0);

        // Timer path runs first, so the slot is idle again and the new alert shows.
        let change = step(&mut d, &happy(), t0 + ms(2000));
        assert!(matches!(change, AlertChange::Raised(a) if a.created_at == t0 + ms(2000)));
        assert_eq!(d.deadline(), Some(t0 + ms(4000)));
    }

    #[test]
    fn test_replacement_without_timer_service() {
        // If the timer path lagged, an offer older than the window still replaces the slot.
        let mut d = AlertDebouncer::default();
        let t0 = Instant::now();
        d.offer(&happy(), t0);
        let angry = Classification {
            emotion: Emotion::Angry,
            confidence: 1.0,
        };
        assert!(matches!(d.offer(&angry, t0 + ms(2001)), AlertChange::Raised(_)));
        assert_eq!(d.current().unwrap().emotion, Emotion::Angry);
    }

    #[test]
    fn test_alert_message() {
        let alert = Alert {
            emotion: Emotion::Surprised,
            confidence: 0.746,
            created_at: Instant::now(),
        };
        assert_eq!(alert.message(), "Surprised detected!");
        assert_eq!(alert.confidence_percent(), 75);
    }
}
