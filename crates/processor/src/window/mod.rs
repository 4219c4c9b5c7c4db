//! Windowing module for stream processing
//!
//! Tumbling windows: fixed-size, non-overlapping intervals. Each record belongs
//! to exactly one window.
//!
//! ```text
//! Time:     0----5----10---15---20---25---30
//! Windows:  [----][----][----][----][----]
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! first record ──> open ──(watermark >= end + grace)──> closed ──> emitted, evicted
//!                                                         │
//!                             later records for it ───────┴──> LateRecordDropped
//! ```
//!
//! With the default grace of zero a window closes as soon as any record at or
//! after its end has been observed.

pub mod assigner;
pub mod manager;
pub mod types;

pub use assigner::{TumblingWindowAssigner, WindowAssigner};
pub use manager::{WindowManager, WindowManagerStats};
pub use types::{ClosedWindow, LateRecordDropped, WindowBounds, Windowed};
