//! Error types for pixgen

use thiserror::Error;

/// Main error type for the pixgen worker
#[derive(Error, Debug)]
pub enum PixgenError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Training dataset preparation error
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Training subprocess error
    #[error("Training error: {0}")]
    Training(String),

    /// Inference subprocess error
    #[error("Inference error: {0}")]
    Inference(String),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Webhook delivery error
    #[error("Webhook error: {0}")]
    Webhook(String),

    /// Weights artifact not found on the volume
    #[error("Weights not found: {0}")]
    WeightsNotFound(String),

    /// Identifier unusable as a volume path component
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for pixgen operations
pub type PixgenResult<T> = Result<T, PixgenError>;

impl From<serde_json::Error> for PixgenError {
    fn from(err: serde_json::Error) -> Self {
        PixgenError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for PixgenError {
    fn from(err: toml::de::Error) -> Self {
        PixgenError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PixgenError::Training("exit code 1".to_string());
        assert_eq!(err.to_string(), "Training error: exit code 1");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PixgenError = io_err.into();
        assert!(matches!(err, PixgenError::Io(_)));
    }
}
