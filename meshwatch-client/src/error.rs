//! Error types for the mesh console client.

use thiserror::Error;

/// Errors that can occur when fetching from the mesh console.
///
/// Every variant is a fetch failure from the user's point of view: the
/// panel that issued the request shows it with a retry hint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned status {0}")]
    Status(u16),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The client could not be configured.
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// True for failures a retry could plausibly fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::Connection(_) | ClientError::Timeout => true,
            ClientError::Status(code) => *code >= 500,
            ClientError::Parse(_) | ClientError::Auth(_) | ClientError::Config(_) => false,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Connection(err.to_string())
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Status(status.as_u16())
        } else {
            ClientError::Http(err.to_string())
        }
    }
}
