//! Service-level error taxonomy
//!
//! Every service operation returns [`ServiceResult`]. The HTTP layer maps
//! each variant to a fixed status class.

use std::time::Duration;

use crate::auth::authorization::AccessError;
use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed payload or missing required parameter
    #[error("{0}")]
    BadInput(String),

    /// Missing or invalid identity
    #[error("{0}")]
    Unauthorized(String),

    /// Identity lacks the rights for the operation
    #[error("{0}")]
    Forbidden(String),

    /// No candidate matched
    #[error("{0}")]
    NotFound(String),

    /// A unique index rejected the write
    #[error("{0}")]
    Conflict(String),

    /// A store call exceeded its budget
    #[error("store operation `{operation}` timed out after {after:?}")]
    StoreTimeout {
        operation: &'static str,
        after: Duration,
    },

    /// Any other persistence failure
    #[error("store error: {0}")]
    Store(String),

    /// A stored document could not be mapped to its entity
    #[error("decode error: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        ServiceError::BadInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ServiceError::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ServiceError::Unauthorized(msg.into())
    }

    /// Whether the failure is the server's fault rather than the caller's
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ServiceError::StoreTimeout { .. } | ServiceError::Store(_) | ServiceError::Decode(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout { operation, after } => ServiceError::StoreTimeout { operation, after },
            StoreError::DuplicateKey { collection, key } => {
                ServiceError::Conflict(format!("a {collection} record with this {key} already exists"))
            }
            StoreError::Decode(msg) => ServiceError::Decode(msg),
            StoreError::InvalidQuery(msg) => ServiceError::BadInput(msg),
            other @ (StoreError::Connection(_) | StoreError::Backend(_)) => {
                ServiceError::Store(other.to_string())
            }
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(err: AccessError) -> Self {
        ServiceError::Forbidden(err.to_string())
    }
}
