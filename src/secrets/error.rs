//! Error types for ZVault client operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors surfaced by [`SecretsClient`](super::SecretsClient).
///
/// One variant per failure kind. Callers branch on the variant; only
/// [`SecretsError::Api`] and [`SecretsError::Timeout`] are ever retried, and
/// only when [`SecretsError::is_retryable`] says so.
#[derive(Error, Debug)]
pub enum SecretsError {
    /// Missing or invalid client configuration (token, org id, project id).
    ///
    /// Raised synchronously, before any network access.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The service rejected the credentials (HTTP 401 or 403).
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The requested secret does not exist in the environment.
    #[error("Secret \"{key}\" not found in environment \"{env}\"")]
    NotFound { key: String, env: String },

    /// Any other non-success response.
    ///
    /// `status` is `0` when the request never produced an HTTP response
    /// (connection refused, reset, DNS failure).
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A single HTTP attempt exceeded the configured request timeout.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// A success response carried a body that could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Resolved configuration failed field validation.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The client was closed and can no longer issue requests.
    #[error("Client is closed")]
    Closed,
}

impl SecretsError {
    /// Create a config error.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError { message: message.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a not found error.
    pub fn not_found(key: impl Into<String>, env: impl Into<String>) -> Self {
        Self::NotFound { key: key.into(), env: env.into() }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api { status, message: message.into() }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into() }
    }

    /// Map a non-success HTTP status to the error kind it implies.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Self::authentication_failed(message)
            }
            _ => Self::api(status.as_u16(), message),
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    /// Whether the default retry policy retries the request that produced this error.
    pub fn is_retryable(&self) -> bool {
        self.is_transient(is_retryable_status)
    }

    /// Timeouts and transport failures are always transient; HTTP errors
    /// are transient when `retryable_status` accepts their status.
    pub fn is_transient(&self, retryable_status: fn(StatusCode) -> bool) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Api { status: 0, .. } => true,
            Self::Api { status, .. } => {
                StatusCode::from_u16(*status).map(retryable_status).unwrap_or(false)
            }
            _ => false,
        }
    }
}

/// Status codes treated as transient: 429, 500, 502, 503, 504.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
