/// Success envelope
///
/// Every successful response has the shape
///
/// ```json
/// { "status": "Success", "desc": "Tasks retrieved successfully", "data": [...] }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A success envelope with its HTTP status
#[derive(Debug)]
pub struct Success<T: Serialize> {
    code: StatusCode,
    envelope: Envelope<T>,
}

impl<T: Serialize> Success<T> {
    /// 200 with a payload
    pub fn ok(desc: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, desc, Some(data))
    }

    /// 201 with the created record
    pub fn created(desc: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, desc, Some(data))
    }

    fn with_status(code: StatusCode, desc: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            envelope: Envelope {
                status: "Success",
                desc: desc.into(),
                data,
            },
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self.envelope)).into_response()
    }
}
