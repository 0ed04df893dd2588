//! Error types for the incident bridge.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;

/// Errors returned by the connector and the sync driver.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument violated a precondition
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote API call failed
    #[error(transparent)]
    Remote(#[from] RemoteRequestError),
}

impl ConnectorError {
    /// The remote error, if this is one.
    #[must_use]
    pub const fn as_remote(&self) -> Option<&RemoteRequestError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

/// Remote operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `GET /api/v1/alerts`
    GetAlerts,
    /// `POST /api/v1/incidents`
    CreateIncident,
    /// `PUT /api/v1/incidents/{id}/status`
    UpdateIncidentStatus,
}

impl Operation {
    /// Get the operation name as used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GetAlerts => "get_alerts",
            Self::CreateIncident => "create_incident",
            Self::UpdateIncidentStatus => "update_incident_status",
        }
    }

    /// Whether repeating the request cannot produce a second side effect.
    #[must_use]
    pub const fn is_idempotent(&self) -> bool {
        !matches!(self, Self::CreateIncident)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed exchange with the remote API.
///
/// Covers connection errors, timeouts, non-2xx statuses and undecodable
/// response bodies. `status` is set whenever a response was received.
#[derive(Debug, Error)]
#[error(
    "{operation} failed{}: {cause}",
    .status.map(|s| format!(" with HTTP {s}")).unwrap_or_default()
)]
pub struct RemoteRequestError {
    /// Operation that failed
    pub operation: Operation,
    /// HTTP status, when the server answered
    pub status: Option<StatusCode>,
    /// Underlying cause
    #[source]
    pub cause: RemoteCause,
}

/// Underlying cause of a [`RemoteRequestError`].
#[derive(Debug, Error)]
pub enum RemoteCause {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("unexpected response: {body}")]
    Status {
        /// Response body, possibly empty
        body: String,
    },

    /// Response body was not the expected JSON
    #[error("Failed to parse response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RemoteRequestError {
    pub(crate) fn transport(operation: Operation, err: reqwest::Error) -> Self {
        Self {
            operation,
            status: err.status(),
            cause: RemoteCause::Transport(err),
        }
    }

    pub(crate) fn status(operation: Operation, status: StatusCode, body: String) -> Self {
        Self {
            operation,
            status: Some(status),
            cause: RemoteCause::Status { body },
        }
    }

    pub(crate) fn decode(operation: Operation, status: StatusCode, err: serde_json::Error) -> Self {
        Self {
            operation,
            status: Some(status),
            cause: RemoteCause::Decode(err),
        }
    }

    /// Numeric HTTP status, when the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }

    /// True when the request never reached the server.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(&self.cause, RemoteCause::Transport(e) if e.is_connect())
    }

    /// True when the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(&self.cause, RemoteCause::Transport(e) if e.is_timeout())
    }

    /// Transient failures: connect errors, timeouts, 429 and 5xx.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        if self.is_connect() || self.is_timeout() {
            return true;
        }

        match (&self.cause, self.status) {
            (RemoteCause::Status { .. }, Some(status)) => {
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
