use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-level failures. Anything that happens once a download is streaming is reported
/// in the body instead; by then the status line has already been sent.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid yt-dlp arguments format: {0}")]
    BadArgs(#[from] shell_words::ParseError),
    #[error("Invalid filename")]
    InvalidFilename,
    #[error("File not found")]
    NotFound,
    #[error("UVX required on server")]
    UvxMissing,
    #[error("Server Error: {0}")]
    Launch(#[from] joblib::error::Error),
    #[error("Server Error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadArgs(_) | ApiError::InvalidFilename => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::UvxMissing | ApiError::Launch(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.to_string() }));
        (self.status(), body).into_response()
    }
}
