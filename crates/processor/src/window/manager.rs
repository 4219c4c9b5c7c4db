//! Window lifecycle management
//!
//! The [`WindowManager`] owns the accumulators of every open window for one
//! window operator. A window is created lazily by the first record assigned to
//! it, closed once the watermark reaches its end (plus grace), emitted once and
//! evicted. Records for a window that is already closed are late and must be
//! dropped by the caller; closed windows are never reopened.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::assigner::{TumblingWindowAssigner, WindowAssigner};
use super::types::{ClosedWindow, WindowBounds};
use crate::error::{WindowError, WindowResult};
use crate::watermark::Watermark;

/// Counters for a window manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowManagerStats {
    /// Windows opened by a first record
    pub windows_created: u64,
    /// Windows closed and handed out by `advance_watermark`
    pub windows_emitted: u64,
    /// Records folded into an open window
    pub records_assigned: u64,
}

/// Keyed tumbling-window state
#[derive(Debug)]
pub struct WindowManager<K, A> {
    assigner: TumblingWindowAssigner,
    grace_ms: i64,
    watermark: Watermark,
    windows: BTreeMap<(WindowBounds, K), A>,
    stats: WindowManagerStats,
}

impl<K, A> WindowManager<K, A>
where
    K: Ord + Clone,
    A: Clone,
{
    /// Create a manager with the no-grace policy
    pub fn new(assigner: TumblingWindowAssigner) -> Self {
        Self {
            assigner,
            grace_ms: 0,
            watermark: Watermark::min(),
            windows: BTreeMap::new(),
            stats: WindowManagerStats::default(),
        }
    }

    /// Tumbling windows of `size_ms` with the given grace period
    pub fn tumbling(size_ms: u64, grace_ms: u64) -> WindowResult<Self> {
        Self::new(TumblingWindowAssigner::new(size_ms)?).with_grace_ms(grace_ms)
    }

    /// Accept records up to `grace_ms` after their window's end
    pub fn with_grace_ms(mut self, grace_ms: u64) -> WindowResult<Self> {
        self.grace_ms =
            i64::try_from(grace_ms).map_err(|_| WindowError::InvalidGrace { grace: grace_ms })?;
        Ok(self)
    }

    /// Window a timestamp belongs to
    pub fn assign(&self, timestamp: i64) -> WindowResult<WindowBounds> {
        self.assigner.assign(timestamp)
    }

    /// True once the watermark has closed `window`
    pub fn is_late(&self, window: &WindowBounds) -> bool {
        Self::is_closed(window, self.grace_ms, self.watermark)
    }

    fn is_closed(window: &WindowBounds, grace_ms: i64, watermark: Watermark) -> bool {
        window.end.saturating_add(grace_ms) <= watermark.timestamp
    }

    /// Fold a value into the accumulator for `(window, key)`.
    ///
    /// The accumulator is created with `init` if absent. The update is
    /// all-or-nothing: when `update` fails the stored accumulator is unchanged.
    /// Callers check [`is_late`](Self::is_late) first; this method does not.
    pub fn update<E, I, F>(&mut self, window: WindowBounds, key: K, init: I, update: F) -> Result<(), E>
    where
        I: FnOnce() -> A,
        F: FnOnce(A) -> Result<A, E>,
    {
        let slot = (window, key);
        let existing = self.windows.get(&slot).cloned();
        let is_new = existing.is_none();

        let next = update(existing.unwrap_or_else(init))?;

        self.windows.insert(slot, next);
        if is_new {
            self.stats.windows_created += 1;
        }
        self.stats.records_assigned += 1;
        Ok(())
    }

    /// Advance the watermark and hand out every window it closes.
    ///
    /// Closed windows are returned in `(start, key)` order and evicted, so each
    /// window is emitted exactly once. A timestamp below the current watermark
    /// does not move it back.
    pub fn advance_watermark(&mut self, timestamp: i64) -> Vec<ClosedWindow<K, A>> {
        if timestamp > self.watermark.timestamp {
            self.watermark = Watermark::new(timestamp);
        }

        let mut closed = Vec::new();
        while let Some(entry) = self.windows.first_entry() {
            if !Self::is_closed(&entry.key().0, self.grace_ms, self.watermark) {
                break;
            }
            let ((window, key), value) = entry.remove_entry();
            closed.push(ClosedWindow { key, window, value });
        }

        if !closed.is_empty() {
            self.stats.windows_emitted += closed.len() as u64;
            debug!(
                closed = closed.len(),
                watermark = self.watermark.timestamp,
                open = self.windows.len(),
                "Closed windows"
            );
        }

        closed
    }

    /// Current accumulator of an open window
    pub fn get(&self, window: &WindowBounds, key: &K) -> Option<&A> {
        self.windows.get(&(*window, key.clone()))
    }

    /// Number of open `(window, key)` accumulators
    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    pub fn stats(&self) -> WindowManagerStats {
        self.stats.clone()
    }
}
