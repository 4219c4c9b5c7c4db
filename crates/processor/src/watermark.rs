//! Watermark tracking for event-time processing
//!
//! The watermark is the latest event timestamp observed by a driver. It never
//! moves backwards: an out-of-order record leaves it unchanged. Windows whose end
//! is at or below the watermark are closed.
//!
//! # Example
//!
//! ```rust
//! use processor::watermark::{MaxTimestampWatermark, WatermarkGenerator};
//!
//! let mut generator = MaxTimestampWatermark::new();
//! assert!(generator.on_event(1000).is_some());
//! // an older event does not move the watermark
//! assert!(generator.on_event(500).is_none());
//! assert_eq!(generator.current_watermark().timestamp, 1000);
//! ```

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Event-time progress of one driver, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    pub timestamp: i64,
}

impl Watermark {
    pub fn new(timestamp: i64) -> Self {
        Self { timestamp }
    }

    /// Nothing observed yet; every window is still open
    pub fn min() -> Self {
        Self { timestamp: i64::MIN }
    }

    pub fn is_min(&self) -> bool {
        self.timestamp == i64::MIN
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::min()
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_min() {
            return write!(f, "Watermark(min)");
        }
        match DateTime::from_timestamp_millis(self.timestamp) {
            Some(dt) => write!(f, "Watermark({})", dt),
            None => write!(f, "Watermark({}ms)", self.timestamp),
        }
    }
}

/// Trait for generating watermarks from event streams
pub trait WatermarkGenerator: Send + Sync {
    /// Called for every record; returns the new watermark if it advanced
    fn on_event(&mut self, timestamp: i64) -> Option<Watermark>;

    /// The current watermark
    fn current_watermark(&self) -> Watermark;

    /// Forget everything observed so far
    fn reset(&mut self);
}

/// Watermark equal to the maximum event timestamp seen
#[derive(Debug, Clone, Default)]
pub struct MaxTimestampWatermark {
    current: Watermark,
}

impl MaxTimestampWatermark {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkGenerator for MaxTimestampWatermark {
    fn on_event(&mut self, timestamp: i64) -> Option<Watermark> {
        if timestamp > self.current.timestamp {
            self.current = Watermark::new(timestamp);
            trace!(watermark = timestamp, "Watermark advanced");
            Some(self.current)
        } else {
            None
        }
    }

    fn current_watermark(&self) -> Watermark {
        self.current
    }

    fn reset(&mut self) {
        self.current = Watermark::min();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_and_min() {
        assert!(Watermark::new(1000) < Watermark::new(2000));
        assert!(Watermark::min() < Watermark::new(i64::MIN + 1));
        assert!(Watermark::min().is_min());
        assert_eq!(Watermark::default(), Watermark::min());
    }

    #[test]
    fn test_display() {
        assert_eq!(Watermark::min().to_string(), "Watermark(min)");
        assert_eq!(
            Watermark::new(0).to_string(),
            "Watermark(1970-01-01 00:00:00 UTC)"
        );
        assert_eq!(Watermark::new(i64::MAX).to_string(), format!("Watermark({}ms)", i64::MAX));
    }

    #[test]
    fn test_max_timestamp_is_monotonic() {
        let mut generator = MaxTimestampWatermark::new();

        assert_eq!(generator.on_event(10), Some(Watermark::new(10)));
        assert_eq!(generator.on_event(7), None);
        assert_eq!(generator.on_event(10), None);
        assert_eq!(generator.current_watermark().timestamp, 10);
        assert_eq!(generator.on_event(11), Some(Watermark::new(11)));
    }

    #[test]
    fn test_negative_event_time_advances_from_min() {
        let mut generator = MaxTimestampWatermark::new();
        assert!(generator.current_watermark().is_min());
        assert_eq!(generator.on_event(-50), Some(Watermark::new(-50)));

        generator.reset();
        assert!(generator.current_watermark().is_min());
    }
}
