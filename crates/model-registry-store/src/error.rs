//! Store error types

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a registry store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Registrant (connection) is missing or invalid
    #[error("Invalid registrant: {0}")]
    InvalidRegistrant(String),

    /// Model header is missing or invalid
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Entity rejected by schema validation
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// Invalid query parameters
    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    /// Event could not be published
    #[error("Event publication failed: {0}")]
    Publish(String),

    /// Internal store error
    #[error("Internal store error: {0}")]
    Internal(String),

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] model_registry_core::RegistryError),
}

impl StoreError {
    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Internal(err.to_string())
    }
}

/// Outcome of a rejected `register_entity` call
///
/// The two flags are independent. When both are false the failure belongs to
/// another class, typically schema validation.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct EntityRegistrationError {
    /// The registrant could not be registered
    pub registrant_error: bool,

    /// The owning model could not be registered
    pub model_error: bool,

    pub source: StoreError,
}

impl EntityRegistrationError {
    pub fn registrant(source: StoreError) -> Self {
        Self {
            registrant_error: true,
            model_error: false,
            source,
        }
    }

    pub fn model(source: StoreError) -> Self {
        Self {
            registrant_error: false,
            model_error: true,
            source,
        }
    }

    pub fn other(source: StoreError) -> Self {
        Self {
            registrant_error: false,
            model_error: false,
            source,
        }
    }
}
