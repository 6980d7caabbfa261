//! Translation of core errors into HTTP responses.

use acervo_core::AcervoError;
use api_shared::ErrorRes;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// Error returned by every handler.
///
/// Client errors carry their message (and field details for validation failures). Server
/// errors are logged and answered with a generic body so storage paths never leak.
#[derive(Debug)]
pub struct ApiError(AcervoError);

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(AcervoError::NotFound(what.into()))
    }

    pub fn invalid(path: &str, message: &str) -> Self {
        Self(AcervoError::invalid(path, message))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AcervoError::Validation(_) | AcervoError::UnsupportedMedia(_) => {
                StatusCode::BAD_REQUEST
            }
            AcervoError::NotFound(_) => StatusCode::NOT_FOUND,
            AcervoError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AcervoError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AcervoError> for ApiError {
    fn from(e: AcervoError) -> Self {
        Self(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self(AcervoError::PayloadTooLarge {
                limit: acervo_core::constants::MAX_UPLOAD_BYTES,
            });
        }
        Self(AcervoError::invalid(
            "",
            format!("malformed multipart body: {}", e.body_text()),
        ))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.0 {
            AcervoError::Validation(details) => {
                ErrorRes::with_details("validation failed", details)
            }
            AcervoError::NotFound(what) => ErrorRes::new(format!("{what} not found")),
            AcervoError::Unauthorized => ErrorRes::new("wrong password"),
            e if e.is_client_error() => ErrorRes::new(e.to_string()),
            e => {
                tracing::error!("request failed: {e:?}");
                ErrorRes::new("internal error")
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
