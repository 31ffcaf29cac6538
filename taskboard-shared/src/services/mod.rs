//! Service operations
//!
//! Each operation takes the caller's [`AuthContext`](crate::auth::context::AuthContext),
//! checks access before touching the store, and returns a typed result or a
//! [`ServiceError`](crate::error::ServiceError).

pub mod mutation;
pub mod overview;
pub mod pipelines;
pub mod projects;
pub mod tasks;
pub mod users;

use serde::de::DeserializeOwned;

use crate::error::{ServiceError, ServiceResult};
use crate::models::from_document;
use crate::store::Cursor;

/// Drains a cursor into models
pub(crate) fn decode_all<T: DeserializeOwned>(cursor: Cursor) -> ServiceResult<Vec<T>> {
    cursor
        .map(|doc| from_document(doc).map_err(ServiceError::from))
        .collect()
}
