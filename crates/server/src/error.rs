//! Top-level error taxonomy for the process: wraps every collaborator
//! crate's error so route handlers can bail with `?` and `IntoResponse`
//! maps them to the carrier-facing HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("session error: {0}")]
    Session(#[from] voxgate_session::SessionError),

    #[error("capacity error: {0}")]
    Capacity(#[from] voxgate_capacity::CapacityError),

    #[error("config error: {0}")]
    Config(#[from] voxgate_config::ConfigError),

    #[error("codec error: {0}")]
    Codec(#[from] voxgate_codec::CodecError),

    #[error("media error: {0}")]
    Media(#[from] voxgate_media::MediaError),

    #[error("stt error: {0}")]
    Stt(#[from] voxgate_stt::SttError),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("call at capacity")]
    AtCapacity,

    #[error("no such call: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::AtCapacity => StatusCode::TOO_MANY_REQUESTS,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(error = %self, "request failed");
        (status, self.to_string()).into_response()
    }
}
