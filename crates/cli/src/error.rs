use processor::ProcessorError;
use rivulet_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing failed: {0}")]
    Processor(#[from] ProcessorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input at {path}:{line}: {reason}")]
    Input {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
