// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`LifelineError`] to HTTP responses and WebSocket error frames.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use lifeline_core::LifelineError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// HTTP status for each error variant. Infrastructure failures are all 500.
pub fn status_for(err: &LifelineError) -> StatusCode {
    match err {
        LifelineError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        LifelineError::Forbidden(_) => StatusCode::FORBIDDEN,
        LifelineError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifelineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LifelineError::Conflict(_) => StatusCode::CONFLICT,
        LifelineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// The message a caller is allowed to see. Internal details are logged and
/// replaced with a generic string.
pub fn public_message(err: &LifelineError) -> String {
    if err.is_client_error() {
        err.to_string()
    } else {
        tracing::error!(error = %err, "internal failure");
        "internal error".to_string()
    }
}

/// Handler error wrapper so handlers can use `?` on hub calls.
#[derive(Debug)]
pub struct ApiError(pub LifelineError);

impl From<LifelineError> for ApiError {
    fn from(err: LifelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorResponse {
            error: public_message(&self.0),
        };
        (status, Json(body)).into_response()
    }
}
