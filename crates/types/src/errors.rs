//! Error types for domain payloads

use thiserror::Error;

/// Result type alias for payload operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Errors raised while validating or converting payloads
#[derive(Error, Debug)]
pub enum TypesError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TypesError::InvalidValue {
            field: "riskLevel",
            value: "EXTREME".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid riskLevel: 'EXTREME'");
        assert_eq!(
            TypesError::Validation("price must be finite".into()).to_string(),
            "Validation error: price must be finite"
        );
    }
}
