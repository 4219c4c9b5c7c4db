//! Prometheus metrics for the stream driver
//!
//! Metrics are registered into a [`MetricsRegistry`] and rendered in the
//! Prometheus text exposition format. All series carry the `rivulet_` prefix;
//! counters get the conventional `_total` suffix on export.

mod driver;
mod labels;
mod registry;

pub use driver::DriverMetrics;
pub use labels::{ErrorLabels, PartitionLabels};
pub use registry::MetricsRegistry;

use thiserror::Error;

/// Errors that can occur in the metrics subsystem
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
