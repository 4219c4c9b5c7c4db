//! Window assigners
//!
//! An assigner maps an event timestamp to the window it belongs to. Window
//! boundaries are a pure function of the timestamp and the window size.

use super::types::WindowBounds;
use crate::error::{WindowError, WindowResult};
use std::fmt;

/// Trait for assigning events to windows
pub trait WindowAssigner: Send + Sync + fmt::Debug {
    /// Assign a timestamp to its window
    fn assign(&self, timestamp: i64) -> WindowResult<WindowBounds>;

    /// Window size in milliseconds
    fn size_ms(&self) -> i64;
}

/// Tumbling window assigner
///
/// Creates fixed-size, non-overlapping windows. Each event is assigned to
/// exactly one window: `start = floor(timestamp / size) * size`.
///
/// # Example
/// ```text
/// Window size: 5
/// Event at timestamp 3  -> Window [0, 5)
/// Event at timestamp 7  -> Window [5, 10)
/// Event at timestamp -1 -> Window [-5, 0)
/// ```
#[derive(Debug, Clone)]
pub struct TumblingWindowAssigner {
    /// Size of each window
    size: i64,
    /// Offset for window alignment
    offset: i64,
}

impl TumblingWindowAssigner {
    /// Create a new tumbling window assigner
    pub fn new(size_ms: u64) -> WindowResult<Self> {
        let size = i64::try_from(size_ms)
            .ok()
            .filter(|size| *size > 0)
            .ok_or(WindowError::InvalidWindowSize { size: size_ms })?;

        Ok(Self { size, offset: 0 })
    }

    /// Shift window alignment by `offset_ms`
    pub fn with_offset(mut self, offset_ms: i64) -> Self {
        self.offset = offset_ms.rem_euclid(self.size);
        self
    }

    /// Calculate the window start for a given timestamp
    fn window_start(&self, timestamp: i64) -> Option<i64> {
        let shifted = timestamp.checked_sub(self.offset)?;
        shifted
            .div_euclid(self.size)
            .checked_mul(self.size)?
            .checked_add(self.offset)
    }
}

impl WindowAssigner for TumblingWindowAssigner {
    fn assign(&self, timestamp: i64) -> WindowResult<WindowBounds> {
        let overflow = || WindowError::Overflow {
            timestamp,
            size: self.size,
        };

        let start = self.window_start(timestamp).ok_or_else(overflow)?;
        let end = start.checked_add(self.size).ok_or_else(overflow)?;
        Ok(WindowBounds::new(start, end))
    }

    fn size_ms(&self) -> i64 {
        self.size
    }
}
