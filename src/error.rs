use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every violated precondition surfaces as one of these variants; a failed
/// operation leaves the stored documents untouched.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("missing or invalid caller identity")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("invalid ride status: {0}")]
    InvalidStatus(String),

    #[error("driver already has an active ride")]
    DriverBusy,

    #[error("this ride is no longer available")]
    RideUnavailable,

    #[error("{0}")]
    Validation(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            Error::InvalidTransition(_) | Error::DriverBusy | Error::RideUnavailable => {
                (StatusCode::CONFLICT, self.to_string())
            }
            Error::InvalidStatus(_) | Error::Validation(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::Database(err) => {
                tracing::error!(error = ?err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".into(),
                )
            }
            Error::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".into(),
                )
            }
        };

        let body = Json(json!({ "error": message }));

        (status, body).into_response()
    }
}
