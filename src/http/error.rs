use crate::state::TokenStoreError;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why a refresh cycle ended without a new credential pair. Cloned to every
/// request that was queued behind the cycle.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token is stored")]
    MissingRefreshToken,
    #[error("refresh request failed: {0}")]
    Transport(String),
    #[error("refresh rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
    },
    #[error("refresh response did not contain a token pair")]
    MalformedResponse,
    #[error("refresh timed out after {0:?}")]
    TimedOut(Duration),
    #[error("could not persist refreshed tokens: {0}")]
    Storage(String),
    #[error("refresh was abandoned before it completed")]
    Abandoned,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("request failed with status {status}")]
    Status {
        status: StatusCode,
        /// The body's `message`, which the API fills for user-facing errors.
        message: Option<String>,
        body: String,
    },
    #[error("session refresh failed: {0}")]
    Refresh(#[from] RefreshError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
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

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Message fit for showing to the person using the app.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Pulls `message` out of an error body. Validation errors carry a list of
/// messages, which are joined.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.get("message")? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}
