use crate::pipeline::PipelineError;
use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

#[derive(Error, Debug)]
pub enum ApiError {
    /// Rejected upload; the message is safe to show to the caller.
    #[error("{0}")]
    ClientInput(String),

    #[error("Uploaded file is too large.")]
    PayloadTooLarge,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Server(#[source] anyhow::Error),
}

impl ApiError {
    pub fn server(e: impl Into<anyhow::Error>) -> Self {
        Self::Server(e.into())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_client_error() {
            Self::ClientInput(e.to_string())
        } else {
            Self::Server(e.into())
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        let status = e.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else if status.is_client_error() {
            Self::ClientInput(e.body_text())
        } else {
            Self::Server(anyhow::anyhow!(e.body_text()))
        }
    }
}

/// A request that is not multipart at all carries no file.
impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        tracing::debug!(error = %e.body_text(), "Upload is not a multipart form");
        PipelineError::MissingFile.into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::ClientInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string()),
            Self::Server(e) => {
                tracing::error!(error = ?e, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
