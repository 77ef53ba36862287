//! Error types for the chirp API client.
//!
//! # Design
//! `MissingToken` is raised while a request is being *built*, so an
//! authenticated call without a session never produces a request value at
//! all. Every non-2xx response outside the search allowlist lands in `Http`
//! with the status, reason phrase and raw body so callers can match on the
//! status instead of inspecting strings.

use thiserror::Error;

/// Errors returned by `ChirpClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An authenticated operation was attempted without a stored token.
    #[error("no session token found")]
    MissingToken,

    /// The server answered with a non-success status.
    #[error("request failed: {status} {status_text} - {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// The HTTP status carried by an `Http` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
