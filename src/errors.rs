use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the cabride client core
#[derive(Debug)]
pub enum ClientError {
    // Backend responses
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Server { status: u16, message: String },

    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),
    InvalidUrl(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),

    // Session and persistence
    NotAuthenticated,
    SessionPersistence(String),

    // Device
    GeolocationDenied,
    GeolocationUnavailable(String),

    // Orchestration state errors
    InvalidState { operation: &'static str, state: String },
    MissingLocations,
    PageFetchInProgress { requested: u32, in_flight: u32 },
    RideNotFound(i64),
    RideRequestNotFound(String),
    Disposed,

    // Validation errors
    ValidationFailed(Vec<ValidationError>),

    // Configuration errors
    InvalidConfiguration(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

/// Error body returned by the backend services.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ClientError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ClientError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ClientError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ClientError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ClientError::Server { status, message } => {
                write!(f, "Server error ({}): {}", status, message)
            }

            ClientError::NetworkTimeout => write!(f, "Network request timed out"),
            ClientError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            ClientError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),
            ClientError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),

            ClientError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            ClientError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),

            ClientError::NotAuthenticated => write!(f, "No authenticated session"),
            ClientError::SessionPersistence(msg) => write!(f, "Session persistence error: {}", msg),

            ClientError::GeolocationDenied => write!(f, "Location access denied"),
            ClientError::GeolocationUnavailable(msg) => write!(f, "Location unavailable: {}", msg),

            ClientError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while {}", operation, state)
            }
            ClientError::MissingLocations => write!(f, "Pickup and dropoff must both be set"),
            ClientError::PageFetchInProgress { requested, in_flight } => write!(
                f,
                "Cannot load page {} while page {} is still loading",
                requested, in_flight
            ),
            ClientError::RideNotFound(id) => write!(f, "Ride not found: {}", id),
            ClientError::RideRequestNotFound(id) => write!(f, "Ride request not found: {}", id),
            ClientError::Disposed => write!(f, "Component has been disposed"),

            ClientError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }

            ClientError::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

// Convenience type alias for Results
pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::NetworkTimeout
        } else if err.is_connect() {
            ClientError::NetworkConnection(err.to_string())
        } else if err.is_decode() {
            ClientError::JsonParsing(err.to_string())
        } else {
            ClientError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            ClientError::JsonParsing(err.to_string())
        } else {
            ClientError::JsonSerialization(err.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::SessionPersistence(err.to_string())
    }
}

impl ClientError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ClientError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        ClientError::Unauthorized(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        ClientError::NotFound(resource.into())
    }

    pub fn server(status: u16, msg: impl Into<String>) -> Self {
        ClientError::Server {
            status,
            message: msg.into(),
        }
    }

    pub fn invalid_state(operation: &'static str, state: impl fmt::Debug) -> Self {
        ClientError::InvalidState {
            operation,
            state: format!("{:?}", state),
        }
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    /// Map a non-success HTTP status and its body text to an error.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    status.canonical_reason().unwrap_or("unknown").to_string()
                } else {
                    body.to_string()
                }
            });

        match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            s if s.is_client_error() => ClientError::BadRequest(message),
            s => ClientError::server(s.as_u16(), message),
        }
    }

    /// A 401 from any backend call ends the session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }
}
