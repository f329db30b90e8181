//! Error responses.
//!
//! Every [`AuthError`] becomes a JSON body `{"error": ..., "error_description": ...}`.
//! Token errors are 401 with a `WWW-Authenticate: Bearer` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AuthError;

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        if status.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "Token operation failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Token operation rejected");
        }

        // Infrastructure detail stays in the log.
        let description = if status.is_server_error() {
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Session storage unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = build_www_authenticate_header(self.error_code(), &description);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = ErrorBody {
            error: self.error_code(),
            error_description: description,
        };
        (status, headers, Json(body)).into_response()
    }
}

/// Maps an error to its HTTP status.
#[must_use]
pub fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidToken { .. }
        | AuthError::RevokedToken
        | AuthError::RefreshMismatch
        | AuthError::GenerationMismatch
        | AuthError::DeviceMismatch
        | AuthError::NoSession => StatusCode::UNAUTHORIZED,
        AuthError::MalformedToken { .. } | AuthError::InvalidRequest { .. } => {
            StatusCode::BAD_REQUEST
        }
        AuthError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::Signing { .. }
        | AuthError::Hashing { .. }
        | AuthError::Configuration { .. }
        | AuthError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format: `Bearer realm="tessera", error="invalid_token", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!("Bearer realm=\"tessera\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}
