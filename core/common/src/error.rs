//! Common error types for sharehub.

use std::fmt;

use thiserror::Error;

/// Remote error code reported when mkdir targets an existing path.
pub const MKDIR_EXISTS_CODE: &str = "ExternalError.MkdirFailed.Exists";

/// Error reported by the remote transfer service.
///
/// Carries the remote HTTP status, the remote error code and the remote
/// message so callers can diagnose failures without the service rewording them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// HTTP status returned by the remote service.
    pub status: u16,
    /// Remote error code, e.g. `ClientError.NotFound`. Empty when the remote
    /// response carried no structured payload.
    pub code: String,
    /// Human-readable message from the remote service.
    pub message: String,
}

impl RemoteError {
    /// Create a new remote error.
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the remote reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.code.starts_with("ClientError.NotFound")
    }

    /// Whether the remote rejected a mkdir because the path already exists.
    pub fn is_already_exists(&self) -> bool {
        self.code == MKDIR_EXISTS_CODE
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{} - {}", self.status, self.message)
        } else {
            write!(f, "{} {} - {}", self.status, self.code, self.message)
        }
    }
}

/// Top-level error type for sharehub operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller presented a missing or wrong API key.
    #[error("Invalid or missing API Key")]
    Unauthorized,

    /// Client-credentials exchange with the identity provider failed.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Identity or remote path does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote path already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request breaches a local policy such as the retention floor.
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// Any other remote failure, passed through unchanged.
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// A bounded wait on a remote task expired.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The remote service could not be reached or answered garbage.
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Message suitable for a response body, without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Error::Unauthorized => self.to_string(),
            Error::Remote(remote) => remote.message.clone(),
            Error::Io(e) => e.to_string(),
            Error::Authentication(msg)
            | Error::NotFound(msg)
            | Error::Conflict(msg)
            | Error::PolicyViolation(msg)
            | Error::Timeout(msg)
            | Error::Network(msg)
            | Error::InvalidInput(msg)
            | Error::Config(msg)
            | Error::Serialization(msg) => msg.clone(),
        }
    }

    /// Whether this error means the addressed resource does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Remote(remote) => remote.is_not_found(),
            _ => false,
        }
    }
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        Error::Remote(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
