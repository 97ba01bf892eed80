//! Errors of the completion client, classified by cause.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognizerErrorKind {
    Network,
    Timeout,
    RateLimited,
    Server,
    Client,
    Parse,
}

#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unreadable completion: {0}")]
    Parse(String),
}

impl RecognizerError {
    pub fn kind(&self) -> RecognizerErrorKind {
        match self {
            Self::Network(_) => RecognizerErrorKind::Network,
            Self::Timeout => RecognizerErrorKind::Timeout,
            Self::Status { status, .. } => classify_http_status(*status),
            Self::Parse(_) => RecognizerErrorKind::Parse,
        }
    }
}

impl From<reqwest::Error> for RecognizerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Maps a non-success HTTP status to an error kind.
pub fn classify_http_status(status: StatusCode) -> RecognizerErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        RecognizerErrorKind::RateLimited
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        RecognizerErrorKind::Timeout
    } else if status.is_server_error() {
        RecognizerErrorKind::Server
    } else {
        RecognizerErrorKind::Client
    }
}
