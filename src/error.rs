use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("stored link {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },

    #[error("no unique link id after {0} attempts")]
    IdSpaceExhausted(u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid link")]
    InvalidLink,

    #[error("Link was already read")]
    AlreadyRead,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("store call timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("could not build link url: {0}")]
    LinkUrl(#[from] url::ParseError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidLink => StatusCode::NOT_FOUND,
            ApiError::AlreadyRead => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Registry(_) | ApiError::Timeout(_) | ApiError::LinkUrl(_) => {
                tracing::error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
