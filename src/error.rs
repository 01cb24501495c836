use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Feed error: {0}")]
    Feed(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Transient failures are abandoned for the current scheduler tick and
    /// retried on the next one. Everything else is treated as a hard error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Http(_)
                | AppError::Database(_)
                | AppError::Io(_)
                | AppError::NotAuthenticated(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::MissingData(_) => StatusCode::NOT_FOUND,
            AppError::Http(_) | AppError::Feed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
