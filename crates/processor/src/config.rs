//! Configuration types for the stream processor
//!
//! [`EngineConfig`] is the per-driver configuration surface. Field names accept
//! both snake_case and the camelCase spellings (`windowSizeMs`,
//! `commitIntervalMs`, `onRecordError`).

use crate::error::{ProcessorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Engine configuration for one driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tumbling window size in milliseconds
    #[serde(default = "default_window_size_ms", alias = "windowSizeMs")]
    pub window_size_ms: u64,

    /// How long after a window's end late records are still accepted.
    /// Zero is the no-grace policy.
    #[serde(default, alias = "graceMs")]
    pub grace_ms: u64,

    /// Commit interval in milliseconds; 0 commits after every record
    #[serde(default, alias = "commitIntervalMs")]
    pub commit_interval_ms: u64,

    /// What to do when a single record fails
    #[serde(default, alias = "onRecordError")]
    pub on_record_error: RecordErrorPolicy,

    /// Maximum records fetched per poll
    #[serde(default = "default_max_poll_records", alias = "maxPollRecords")]
    pub max_poll_records: usize,

    /// Back-off between empty polls in milliseconds
    #[serde(default = "default_poll_timeout_ms", alias = "pollTimeoutMs")]
    pub poll_timeout_ms: u64,

    /// Delivery guarantee applied by sink operators
    #[serde(default)]
    pub delivery: DeliveryGuarantee,
}

/// Policy for record-level failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorPolicy {
    /// Log, count and continue with the next record
    #[default]
    Skip,
    /// Stop the driver with the error
    Halt,
}

impl fmt::Display for RecordErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordErrorPolicy::Skip => write!(f, "skip"),
            RecordErrorPolicy::Halt => write!(f, "halt"),
        }
    }
}

/// Delivery guarantee level for sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    /// Fire and forget: failed sends are logged and dropped
    AtMostOnce,
    /// Failed sends stop the driver before the offset is committed
    #[default]
    AtLeastOnce,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size_ms: default_window_size_ms(),
            grace_ms: 0,
            commit_interval_ms: 0,
            on_record_error: RecordErrorPolicy::default(),
            max_poll_records: default_max_poll_records(),
            poll_timeout_ms: default_poll_timeout_ms(),
            delivery: DeliveryGuarantee::default(),
        }
    }
}

impl EngineConfig {
    /// Config with the given tumbling window size and defaults elsewhere
    pub fn tumbling(window_size_ms: u64) -> Self {
        Self {
            window_size_ms,
            ..Default::default()
        }
    }

    pub fn with_commit_interval_ms(mut self, interval_ms: u64) -> Self {
        self.commit_interval_ms = interval_ms;
        self
    }

    pub fn with_record_error_policy(mut self, policy: RecordErrorPolicy) -> Self {
        self.on_record_error = policy;
        self
    }

    pub fn with_grace_ms(mut self, grace_ms: u64) -> Self {
        self.grace_ms = grace_ms;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryGuarantee) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_max_poll_records(mut self, max: usize) -> Self {
        self.max_poll_records = max;
        self
    }

    /// Commit interval, or `None` for per-record commits
    pub fn commit_interval(&self) -> Option<Duration> {
        if self.commit_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.commit_interval_ms))
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.window_size_ms == 0 {
            return Err(ProcessorError::Configuration {
                source: "window_size_ms must be greater than 0".into(),
            });
        }

        if i64::try_from(self.window_size_ms).is_err() {
            return Err(ProcessorError::Configuration {
                source: format!("window_size_ms {} exceeds i64 range", self.window_size_ms).into(),
            });
        }

        if i64::try_from(self.grace_ms).is_err() {
            return Err(ProcessorError::Configuration {
                source: format!("grace_ms {} exceeds i64 range", self.grace_ms).into(),
            });
        }

        if self.max_poll_records == 0 {
            return Err(ProcessorError::Configuration {
                source: "max_poll_records must be greater than 0".into(),
            });
        }

        if self.poll_timeout_ms == 0 {
            return Err(ProcessorError::Configuration {
                source: "poll_timeout_ms must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

fn default_window_size_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_max_poll_records() -> usize {
    500
}

fn default_poll_timeout_ms() -> u64 {
    100
}
