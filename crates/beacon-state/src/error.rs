//! Error types for the Beacon store.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for store operations.
pub type StateResult<T> = Result<T, StateError>;

/// One rejected field in a create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    /// Machine-readable reason: `required`, `too_long`, `invalid`.
    pub key: String,
}

impl FieldError {
    pub fn new(field: &str, key: &str) -> Self {
        Self {
            field: field.to_string(),
            key: key.to_string(),
        }
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("incident {0} is resolved")]
    IncidentResolved(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

impl StateError {
    /// Stable machine-readable key for clients.
    pub fn key(&self) -> &'static str {
        match self {
            StateError::ServiceNotFound(_) => "service_not_found",
            StateError::IncidentNotFound(_) => "incident_not_found",
            StateError::Validation(_) => "validation_failed",
            StateError::IncidentResolved(_) => "incident_resolved",
            _ => "storage_error",
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.key))
        .collect::<Vec<_>>()
        .join(", ")
}
