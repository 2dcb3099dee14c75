use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// Every variant is reported only to the originating connection as a generic
/// `error` notification carrying the display message; no partial state is
/// committed for a rejected operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Malformed or out-of-bounds command payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A non-host connection attempted a host-only action, or a connection
    /// acted for a participant it is not currently bound to.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Referenced entity is absent or outside the session's scope.
    #[error("not found: {0}")]
    NotFound(String),
    /// The participant's fixed vote budget would be exceeded.
    #[error("vote budget exceeded: {0}")]
    QuotaExceeded(String),
    /// Uniqueness violation such as a duplicate connection or a taken
    /// display name.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}
