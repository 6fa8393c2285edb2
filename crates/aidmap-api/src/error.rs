use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use aidmap_crypto::CodecError;
use aidmap_types::api::ErrorResponse;

/// Failures surfaced at the HTTP boundary. Every variant renders as
/// `{"error": "..."}`; server-side variants never expose their cause.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Request has been deleted")]
    Deleted,

    #[error("Encrypted field failed authentication")]
    Tampered,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Deleted => StatusCode::CONFLICT,
            ApiError::Tampered | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Tampered => ApiError::Tampered,
            other => ApiError::Store(other.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("{:?}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
