// error.rs - Error taxonomy for the fetch/generate flow and its HTTP mapping
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;
use uuid::Uuid;

use crate::models::ErrorResponse;

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

/// Failures of the audio download capability
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid video URL: {0}")]
    InvalidUrl(String),

    #[error("No audio stream found for the given URL.")]
    NoAudioStream,

    #[error(
        "Audio file is too large ({:.2} MB). Limit is {:.0}MB.",
        megabytes(.size_bytes),
        megabytes(.limit_bytes)
    )]
    EstimatedTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error(
        "Audio file too large ({:.2} MB) after download. Limit is {:.0}MB.",
        megabytes(.size_bytes),
        megabytes(.limit_bytes)
    )]
    DownloadedTooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("Download finished but file not found.")]
    MissingOutput,

    #[error("download tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("{0}")]
    DownloadFailed(String),

    #[error("scratch directory I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the content generation capability
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("GOOGLE_API_KEY not configured")]
    MissingApiKey,

    #[error("rate limited by upstream (429): {0}")]
    RateLimited(String),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("uploaded file could not be processed: {0}")]
    FileProcessing(String),

    #[error("model output is not a valid blog post: {0}")]
    MalformedOutput(String),

    #[error("failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_))
    }
}

/// Error surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request body: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::Fetch(_) => StatusCode::BAD_REQUEST,
            AppError::Generation(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing detail string. Internal causes never leave the process.
    pub fn detail(&self) -> String {
        match self {
            AppError::InvalidRequest(reason) => format!("Invalid request body: {}", reason),
            AppError::Fetch(e) => format!("Failed to download audio: {}", e),
            AppError::Generation(GenerationError::MissingApiKey) => {
                GenerationError::MissingApiKey.to_string()
            }
            AppError::Generation(e) => format!("AI generation failed: {}", e),
            AppError::Internal(_) => internal_error_detail().to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

pub fn internal_error_detail() -> &'static str {
    "Internal server error"
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Internal(cause) => {
                let error_id = Uuid::new_v4();
                tracing::error!(error_id = %error_id, error = %cause, "unhandled error occurred");
            }
            AppError::InvalidRequest(reason) => tracing::warn!(error = %reason, "rejected request body"),
            AppError::Fetch(e) => tracing::warn!(error = %e, "audio fetch failed"),
            AppError::Generation(e) => tracing::error!(error = %e, "content generation failed"),
        }

        (status, Json(ErrorResponse { detail: self.detail() })).into_response()
    }
}
