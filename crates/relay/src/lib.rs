pub mod config;
pub mod filter;
pub mod message;
pub mod server;
pub mod sinks;
pub mod sources;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("No token provided")]
    MissingToken,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Invalid alert payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("Failed to read request body: {0}")]
    Body(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Delivery error: {0}")]
    Delivery(String),
    #[error("Invalid chat id {0:?}")]
    InvalidChatId(String),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::MissingToken | Error::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            // Decoder message goes back to the caller as-is.
            Error::Payload(e) => (status, Json(json!({ "error": e.to_string() }))).into_response(),
            Error::NotFound | Error::MethodNotAllowed | Error::MissingToken | Error::Unauthorized => {
                (status, self.to_string()).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(Error::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(Error::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Config("BOT_TOKEN".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn payload_error_message_names_the_decoder_failure() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let msg = Error::Payload(err).to_string();
        assert!(msg.starts_with("Invalid alert payload:"));
    }
}
