use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::schema::{ValidationErrorResponse, ValidationErrors};

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
    #[error("model execution failed: {0}")]
    Inference(String),
    #[error("other: {0}")]
    Other(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            ServiceError::Validation(errors) => {
                let body = ValidationErrorResponse {
                    detail: errors.into_issues(),
                };
                (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(body)).into_response()
            }
            ServiceError::Inference(_) | ServiceError::Other(_) => {
                tracing::error!(error = %self, "request failed");
                let body = serde_json::json!({
                    "error": self.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response()
            }
        }
    }
}

/// Cache backend faults. These never reach a client.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("unsupported cache url: {0}")]
    UnsupportedUrl(String),
    #[error("cache connection already closed")]
    Closed,
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Conditions that prevent the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("model artifact missing: {}", .0.display())]
    ModelMissing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model artifact: {0}")]
    ModelFormat(#[from] serde_json::Error),
    #[error("incompatible model artifact: {0}")]
    IncompatibleModel(String),
    #[error("cache backend unavailable: {0}")]
    Cache(#[from] CacheError),
}
