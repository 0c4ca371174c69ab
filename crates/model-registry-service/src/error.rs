//! Service-layer error types
//!
//! This module defines error types specific to the service layer,
//! mapping domain and store errors to service-level errors.

use model_registry_core::RegistryError;
use model_registry_store::StoreError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Service-layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Uploaded content is not of the expected file type
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem error while staging or packaging
    #[error("IO error: {0}")]
    Io(String),

    /// Remote content could not be downloaded
    #[error("Download failed: {0}")]
    Download(String),

    /// Model or package generation failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Registry store error
    #[error("Store error: {0}")]
    Store(String),

    /// Internal service error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether the caller supplied bad input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidFileType(_) | ServiceError::InvalidInput(_)
        )
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unmarshal(msg) => ServiceError::InvalidInput(msg),
            RegistryError::InvalidSchemaVersion(msg) => {
                ServiceError::InvalidInput(format!("Invalid schema version: {}", msg))
            }
            RegistryError::UnsupportedFormat(msg) => {
                ServiceError::InvalidInput(format!("Unsupported format: {}", msg))
            }
            RegistryError::ValidationError(msg) => ServiceError::InvalidInput(msg),
            RegistryError::IoError(msg) => ServiceError::Io(msg),
            _ => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::InvalidQuery(msg) => ServiceError::InvalidInput(msg),
            StoreError::Domain(err) => ServiceError::from(err),
            other => ServiceError::Store(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("Serialization error: {}", err))
    }
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        ServiceError::Generation(format!("Invalid sheet: {}", err))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Download(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::Internal(format!("Background task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: ServiceError = StoreError::NotFound("model x".to_string()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn test_store_failure_maps_to_store() {
        let err: ServiceError = StoreError::Internal("lock poisoned".to_string()).into();
        assert!(matches!(err, ServiceError::Store(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_unmarshal_is_client_error() {
        let err: ServiceError = RegistryError::Unmarshal("bad".to_string()).into();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ServiceError = io.into();
        assert!(matches!(err, ServiceError::Io(_)));
    }
}
