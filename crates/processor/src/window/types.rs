//! Window types and bounds
//!
//! This module defines the core window types used for time-based aggregations:
//! the half-open interval [`WindowBounds`], the emitted [`Windowed`] result and
//! the [`LateRecordDropped`] notice for records that arrive after their window
//! has closed.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::DisplayKey;

/// Half-open time interval `[start, end)` in epoch milliseconds.
///
/// Ordered by start, then end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Start time of the window (inclusive)
    pub start: i64,
    /// End time of the window (exclusive)
    pub end: i64,
}

impl WindowBounds {
    /// Create a new window bounds
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start < end, "window start must be before end");
        Self { start, end }
    }

    /// Length of the window in milliseconds
    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Check if a timestamp falls within this window
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Stable identifier, `"{start}_{end}"`
    pub fn id(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (
            DateTime::from_timestamp_millis(self.start),
            DateTime::from_timestamp_millis(self.end),
        ) {
            (Some(start), Some(end)) => write!(
                f,
                "[{} - {})",
                start.format("%Y-%m-%d %H:%M:%S%.3f"),
                end.format("%Y-%m-%d %H:%M:%S%.3f")
            ),
            _ => write!(f, "[{} - {})", self.start, self.end),
        }
    }
}

/// Aggregate of one key over one window, as emitted on close
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Windowed<A> {
    pub window: WindowBounds,
    pub value: A,
}

impl<A> Windowed<A> {
    pub fn new(window: WindowBounds, value: A) -> Self {
        Self { window, value }
    }
}

/// A window removed from the manager once the watermark passed its end
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow<K, A> {
    pub key: K,
    pub window: WindowBounds,
    pub value: A,
}

/// Notice that a record was discarded because its window had already closed.
///
/// Not an error: the driver counts and logs these but keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LateRecordDropped {
    /// Operator that dropped the record
    pub operator: String,
    /// Encoded key of the dropped record
    pub key: Option<Vec<u8>>,
    /// Event time of the dropped record
    pub timestamp: i64,
    /// The closed window the record belonged to
    pub window: WindowBounds,
    /// Watermark at the time of the drop
    pub watermark: i64,
}

impl fmt::Display for LateRecordDropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "late record dropped by '{}': key={} timestamp={} window={} watermark={}",
            self.operator,
            DisplayKey(self.key.as_deref()),
            self.timestamp,
            self.window.id(),
            self.watermark
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_creation() {
        let bounds = WindowBounds::new(1000, 2000);
        assert_eq!(bounds.start, 1000);
        assert_eq!(bounds.end, 2000);
        assert_eq!(bounds.duration_ms(), 1000);
        assert_eq!(bounds.id(), "1000_2000");
    }

    #[test]
    fn test_window_bounds_contains() {
        let bounds = WindowBounds::new(0, 5);
        assert!(bounds.contains(0));
        assert!(bounds.contains(4));
        assert!(!bounds.contains(5));
        assert!(!bounds.contains(-1));
    }

    #[test]
    fn test_window_bounds_ordering() {
        let w1 = WindowBounds::new(0, 5);
        let w2 = WindowBounds::new(5, 10);
        let w3 = WindowBounds::new(-5, 0);
        let mut windows = vec![w2, w1, w3];
        windows.sort();
        assert_eq!(windows, vec![w3, w1, w2]);
    }

    #[test]
    fn test_window_bounds_display() {
        let bounds = WindowBounds::new(0, 300_000);
        assert_eq!(
            bounds.to_string(),
            "[1970-01-01 00:00:00.000 - 1970-01-01 00:05:00.000)"
        );
    }

    #[test]
    fn test_late_record_display() {
        let late = LateRecordDropped {
            operator: "windowed-count".to_string(),
            key: Some(b"Mumbai".to_vec()),
            timestamp: 3,
            window: WindowBounds::new(0, 5),
            watermark: 7,
        };
        assert_eq!(
            late.to_string(),
            "late record dropped by 'windowed-count': key=Mumbai timestamp=3 window=0_5 watermark=7"
        );
    }
}
