//! Error types for the stream processor
//!
//! Errors fall into two groups. Record errors (decode, transform, missing key,
//! serialization) affect a single record and are handled by the driver's
//! `on_record_error` policy. Everything else (state, delivery, source,
//! topology, configuration) is fatal and halts the driver.

use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// A payload could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A user-supplied function failed
    #[error("transform error in operator '{operator}': {reason}")]
    Transform { operator: String, reason: String },

    /// A keyed operator received a record without a key
    #[error("record without key reached keyed operator '{operator}'")]
    MissingKey { operator: String },

    /// Window-related errors
    #[error("window error: {0}")]
    Window(#[from] WindowError),

    /// State backend errors
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// A sink rejected a record under at-least-once delivery
    #[error("delivery to topic '{topic}' failed: {reason}")]
    Delivery { topic: String, reason: String },

    /// The source failed to poll or commit
    #[error("source error: {0}")]
    Source(String),

    /// Topology wiring errors
    #[error("topology error: {0}")]
    Topology(String),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization errors while encoding an output payload
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ProcessorError {
    /// Build a transform error attributed to an operator
    pub fn transform<O: Into<String>>(operator: O, err: TransformError) -> Self {
        ProcessorError::Transform {
            operator: operator.into(),
            reason: err.reason,
        }
    }

    /// True when the failure is confined to the record being processed.
    ///
    /// Record errors are subject to the `on_record_error` policy; all other
    /// errors stop the driver.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            ProcessorError::Decode(_)
                | ProcessorError::Transform { .. }
                | ProcessorError::MissingKey { .. }
                | ProcessorError::Serialization(_)
        )
    }

    /// Short label used in logs and metric labels
    pub fn error_type(&self) -> &'static str {
        match self {
            ProcessorError::Decode(_) => "decode",
            ProcessorError::Transform { .. } => "transform",
            ProcessorError::MissingKey { .. } => "missing_key",
            ProcessorError::Window(_) => "window",
            ProcessorError::State(_) => "state",
            ProcessorError::Delivery { .. } => "delivery",
            ProcessorError::Source(_) => "source",
            ProcessorError::Topology(_) => "topology",
            ProcessorError::Configuration { .. } => "configuration",
            ProcessorError::Serialization(_) => "serialization",
            ProcessorError::Io(_) => "io",
            ProcessorError::Unexpected(_) => "unexpected",
        }
    }
}

/// Malformed payload: absent fields, wrong types or invalid encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode {codec} payload: {reason}")]
pub struct DecodeError {
    /// Name of the codec that rejected the payload
    pub codec: String,
    /// Underlying parser message
    pub reason: String,
}

impl DecodeError {
    pub fn new<C: Into<String>, R: Into<String>>(codec: C, reason: R) -> Self {
        Self {
            codec: codec.into(),
            reason: reason.into(),
        }
    }
}

/// Failure raised by a user function (mapper, key selector, updater)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct TransformError {
    pub reason: String,
}

impl TransformError {
    pub fn new<R: Into<String>>(reason: R) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Window assignment and management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// Window size is invalid
    #[error("invalid window size: {size}ms, must be greater than 0 and fit in i64")]
    InvalidWindowSize { size: u64 },

    /// Grace period does not fit the timestamp range
    #[error("invalid grace period: {grace}ms, out of range")]
    InvalidGrace { grace: u64 },

    /// Window end overflows the timestamp range
    #[error("window for timestamp {timestamp} overflows with size {size}ms")]
    Overflow { timestamp: i64, size: i64 },
}

/// State backend operation errors
#[derive(Error, Debug)]
pub enum StateError {
    /// State backend not initialized
    #[error("state backend not initialized: {backend_type}")]
    NotInitialized { backend_type: String },

    /// State serialization failed
    #[error("state serialization failed for key '{key}': {reason}")]
    SerializationFailed { key: String, reason: String },

    /// State deserialization failed
    #[error("state deserialization failed for key '{key}': {reason}")]
    DeserializationFailed { key: String, reason: String },

    /// State backend storage error
    #[error("storage error in {backend_type}: {details}")]
    StorageError {
        backend_type: String,
        details: String,
    },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for window operations
pub type WindowResult<T> = std::result::Result<T, WindowError>;

/// Result type alias for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Result type alias for user functions
pub type TransformResult<T> = std::result::Result<T, TransformError>;

impl From<bincode::Error> for ProcessorError {
    fn from(err: bincode::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(err: anyhow::Error) -> Self {
        ProcessorError::Unexpected(err.to_string())
    }
}

impl From<String> for TransformError {
    fn from(reason: String) -> Self {
        TransformError { reason }
    }
}

impl From<&str> for TransformError {
    fn from(reason: &str) -> Self {
        TransformError {
            reason: reason.to_string(),
        }
    }
}
