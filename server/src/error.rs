use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::{FailureDiagnosis, TtsError};

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Tts(#[from] TtsError),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnosis: Option<FailureDiagnosis>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut diagnosis = None;
        let (status, error_message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tts(TtsError::InvalidRequest(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Tts(e) => {
                if let TtsError::SynthesisFailed { diagnosis: d, .. } = &e {
                    diagnosis = Some(*d);
                }
                tracing::error!("TTS error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(ErrorResponse {
            status: "error",
            error: error_message,
            code: status.as_u16(),
            diagnosis,
        });

        (status, body).into_response()
    }
}
