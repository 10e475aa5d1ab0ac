//! Client Error Types
//!
//! Error hierarchy for the admin API client: configuration, transport,
//! backend status, session and storage failures.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the admin API client.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Stable error code for log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CLIENT_CONFIG",
            Self::Network(_) => "CLIENT_NETWORK",
            Self::Api(_) => "CLIENT_API",
            Self::Session(_) => "CLIENT_SESSION",
            Self::Storage(_) => "CLIENT_STORAGE",
            Self::Protocol(_) => "CLIENT_PROTOCOL",
        }
    }

    /// Check if the failed operation may succeed when tried again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Api(ApiError::Status { status, .. }) => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// Check if the error ended the session and the user must sign in again.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Session(SessionError::RefreshFailed { .. })
                | Self::Session(SessionError::Unauthorized)
        )
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(ApiError::Status { status, .. }) => Some(*status),
            Self::Session(SessionError::Unauthorized) => Some(401),
            Self::Session(SessionError::SignInRejected { status, .. }) => *status,
            _ => None,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Request failed: {message}")]
    RequestFailed { message: String },
}

impl NetworkError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RequestFailed { .. })
    }
}

/// Non-success response from the backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Authentication session error.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Request rejected as unauthorized after session refresh")]
    Unauthorized,

    #[error("Sign-in rejected: {message}")]
    SignInRejected {
        status: Option<u16>,
        message: String,
    },
}

/// Storage backend error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },
}

/// Protocol/response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Backend error body, as far as the client understands it.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parse a backend error body.
pub fn parse_error_body(body: &[u8]) -> Option<ErrorBody> {
    serde_json::from_slice(body).ok()
}

/// Build the error for a non-success response.
pub fn create_error_from_response(status: u16, body: &[u8]) -> ClientError {
    ClientError::Api(ApiError::Status {
        status,
        body: String::from_utf8_lossy(body).into_owned(),
    })
}

/// Get user-friendly error message.
pub fn get_user_message(error: &ClientError) -> String {
    match error {
        ClientError::Session(SessionError::RefreshFailed { .. })
        | ClientError::Session(SessionError::Unauthorized) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        ClientError::Session(SessionError::SignInRejected { message, .. }) => message.clone(),
        ClientError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        ClientError::Api(ApiError::Status { status, body }) => parse_error_body(body.as_bytes())
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("The server responded with status {}.", status)),
        _ => "Something went wrong. Please try again.".to_string(),
    }
}
