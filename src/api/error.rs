//! Errors surfaced by the API client

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Server answered with a non-2xx status.
    #[error("HTTP {} for {url}: {body}", .status.as_u16())]
    Status {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// Request never produced a response (connect, timeout, TLS...).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to parse response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid request for {path}: {reason}")]
    InvalidRequest { path: String, reason: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
