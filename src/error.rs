use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Notification rejected (status {status}): {body}")]
    Notify { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Raised when an outcome-price field cannot be decoded into two finite numbers.
/// Never leaves the normalizer: it is mapped to an undefined price pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPricePair {
    #[error("expected a sequence, got {0}")]
    NotASequence(&'static str),

    #[error("sequence has {0} element(s), need at least 2")]
    TooShort(usize),

    #[error("element {index} is not a finite number")]
    NotFinite { index: usize },

    #[error("undecodable literal: {0}")]
    Undecodable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
