//! Error types for the model registry core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Main error type for core operations
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Entity document could not be decoded
    #[error("Failed to unmarshal entity: {0}")]
    Unmarshal(String),

    /// Entity document carries an unknown schema version
    #[error("Invalid schema version: {0}")]
    InvalidSchemaVersion(String),

    /// Unsupported output format requested
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// A directory does not match the canonical package layout
    #[error("Invalid package layout at {path}: {reason}")]
    InvalidLayout { path: String, reason: String },

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RegistryError {
    fn from(err: serde_yaml::Error) -> Self {
        RegistryError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::IoError(err.to_string())
    }
}
