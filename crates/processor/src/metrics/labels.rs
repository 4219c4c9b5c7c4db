//! Label sets for driver metrics

use prometheus_client::encoding::EncodeLabelSet;

/// Labels for per-record failures, keyed by [`ProcessorError::error_type`]
///
/// [`ProcessorError::error_type`]: crate::error::ProcessorError::error_type
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub error_type: String,
}

impl ErrorLabels {
    pub fn new<S: Into<String>>(error_type: S) -> Self {
        Self {
            error_type: error_type.into(),
        }
    }
}

/// Labels for per-partition-group series
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PartitionLabels {
    pub partition: String,
}

impl PartitionLabels {
    pub fn new(partition: u32) -> Self {
        Self {
            partition: partition.to_string(),
        }
    }
}
