//! Error responses

use axum::response::{IntoResponse, Response};
use axum::Json;
use stackd_api::ErrorResponse;
use tracing::{debug, error};

use crate::errors::StackError;

/// A [`StackError`] rendered as `{"message": ..., "details": ...}`
#[derive(Debug)]
pub struct ApiError(pub StackError);

impl From<StackError> for ApiError {
    fn from(err: StackError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected ({}): {}", status, self.0);
        }

        let body = ErrorResponse {
            message: self.0.message(),
            details: self.0.details(),
        };
        (status, Json(body)).into_response()
    }
}
