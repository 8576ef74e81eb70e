//! Error types for the session/data-sync core

use std::fmt;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// An authenticated call was made with no session credentials at all
    Unauthenticated,

    /// Refresh failed or the retried call was still rejected. Terminal.
    SessionExpired,

    /// No response reached us from the server
    Transport(String),

    /// The server answered but reported a business failure
    Service { status: u16, message: String },

    /// A single service's history fetch failed while its siblings were fetched
    PartialFetchFailure { service_id: u64, reason: String },

    /// HTTP client error
    Http(reqwest::Error),

    /// JSON serialization/deserialization failed
    Json(serde_json::Error),

    /// Configuration error
    Config(String),

    /// Credential store rejected an update
    Credentials(String),
}

impl SyncError {
    /// Whether the surrounding UI has to send the user back to the login screen.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, SyncError::SessionExpired)
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Unauthenticated => write!(f, "Not authenticated"),
            SyncError::SessionExpired => write!(f, "Session expired, please log in again"),
            SyncError::Transport(msg) => write!(f, "Transport error: {}", msg),
            SyncError::Service { status, message } => {
                write!(f, "Service error ({}): {}", status, message)
            }
            SyncError::PartialFetchFailure { service_id, reason } => {
                write!(f, "Failed to fetch history for service {}: {}", service_id, reason)
            }
            SyncError::Http(err) => write!(f, "HTTP error: {}", err),
            SyncError::Json(err) => write!(f, "JSON error: {}", err),
            SyncError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SyncError::Credentials(msg) => write!(f, "Credential error: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Http(err) => Some(err),
            SyncError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err)
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Json(err)
    }
}
