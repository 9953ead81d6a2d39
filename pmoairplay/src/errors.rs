use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

/// Failure of an AirPlay request, as seen by the sender.
#[derive(Debug, Error)]
pub enum AirPlayError {
    /// The device is held by another sender.
    #[error("Device is busy")]
    Busy,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Failed(String),
}

impl AirPlayError {
    pub fn failed(err: impl std::fmt::Display) -> Self {
        AirPlayError::Failed(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AirPlayError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AirPlayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AirPlayError::Failed(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

/// Bodies stay empty: senders get the status code, the log gets the cause.
impl IntoResponse for AirPlayError {
    fn into_response(self) -> Response {
        match &self {
            AirPlayError::Busy => debug!("Rejecting request, device is busy"),
            AirPlayError::BadRequest(reason) => debug!("Rejecting malformed request: {}", reason),
            AirPlayError::Failed(reason) => error!("Failed to process AirPlay request: {}", reason),
        }
        self.status().into_response()
    }
}
