use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::RecommendError;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Recommend(err) => match err {
                RecommendError::UnknownUser(_) | RecommendError::UnknownItem(_) => {
                    StatusCode::NOT_FOUND
                }
                RecommendError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
                RecommendError::EmptyMatrix { .. }
                | RecommendError::NoHistory(_)
                | RecommendError::NoQualifyingRating { .. }
                | RecommendError::IneligibleSeed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                RecommendError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Csv(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Recommendation task failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
