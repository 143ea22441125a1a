use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::extract::rejection::BytesRejection;
use axum::Json;
use log::{ error, warn };
use std::time::Duration;

use crate::models::chat::ErrorResponse;

/// Failures of a single generation process.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The interpreter or script could not be launched.
    #[error("Failed to start generation process: {reason}")]
    Unavailable {
        reason: String,
    },
    #[error("Process exited with code {}: {}", display_code(.code), .stderr.trim())]
    ExecutionFailed {
        code: Option<i32>,
        stderr: String,
    },
    #[error("Mini-ICEBURG took too long to respond (timed out after {}s)", .0.as_secs_f32())]
    Timeout(Duration),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl GenerationError {
    fn label(&self) -> &'static str {
        match self {
            GenerationError::Unavailable { .. } => "Mini-ICEBURG is unavailable",
            GenerationError::ExecutionFailed { .. } => "Mini-ICEBURG execution failed",
            GenerationError::Timeout(_) => "Mini-ICEBURG timeout",
        }
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("Unreadable request body: {0}")]
    Body(#[from] BytesRejection),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("All {0} generation slots are in use")]
    Busy(usize),
    #[error("Rate limit exceeded")]
    RateLimited,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::InvalidInput(detail) => {
                warn!("Rejected chat request: {}", detail);
                (StatusCode::BAD_REQUEST, ErrorResponse {
                    error: detail.clone(),
                    message: None,
                })
            }
            ApiError::Body(rejection) => {
                warn!("Rejected chat request body: {}", rejection);
                (rejection.status(), ErrorResponse {
                    error: "Invalid request body".into(),
                    message: Some(rejection.body_text()),
                })
            }
            ApiError::Generation(e) => {
                error!("{}: {}", e.label(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse {
                    error: e.label().to_string(),
                    message: Some(e.to_string()),
                })
            }
            ApiError::Busy(_) => {
                warn!("{}", self);
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse {
                    error: "Mini-ICEBURG is at capacity".into(),
                    message: Some(self.to_string()),
                })
            }
            ApiError::RateLimited => {
                warn!("Chat rate limit exceeded");
                (StatusCode::TOO_MANY_REQUESTS, ErrorResponse {
                    error: "Too many requests".into(),
                    message: Some(self.to_string()),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
