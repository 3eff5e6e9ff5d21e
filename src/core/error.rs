//! Unified error handling for mixgate
//!
//! Boundary handlers map these onto HTTP status codes; the aggregation
//! engine never lets them escape and degrades to an empty result instead.

use std::fmt;

use http::StatusCode;

/// Unified error types for the gateway
#[derive(Debug)]
pub enum GatewayError {
    /// Malformed input rejected at the boundary
    Validation(String),

    /// Resource not found errors
    NotFound(String),

    /// A dependency descriptor matched no registered service
    DependencyNotFound(String),

    /// The call path revisited an address
    CircularDependency(String),

    /// The call path grew past the configured depth bound
    DepthExceeded(usize),

    /// Outbound request failures
    Transport(String),

    /// Internal system errors
    Internal(String),
}

impl GatewayError {
    /// Status code reported to the HTTP client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Validation(msg) => write!(f, "Validation error: {msg}"),
            GatewayError::NotFound(msg) => write!(f, "Resource not found: {msg}"),
            GatewayError::DependencyNotFound(msg) => write!(f, "Dependency not found: {msg}"),
            GatewayError::CircularDependency(addr) => {
                write!(f, "Circular dependency detected at {addr}")
            }
            GatewayError::DepthExceeded(depth) => {
                write!(f, "Dependency depth exceeded limit of {depth}")
            }
            GatewayError::Transport(msg) => write!(f, "Transport error: {msg}"),
            GatewayError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Validation(format!("invalid JSON payload: {err}"))
    }
}

impl From<validator::ValidationErrors> for GatewayError {
    fn from(err: validator::ValidationErrors) -> Self {
        GatewayError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<Box<pingora_error::Error>> for GatewayError {
    fn from(err: Box<pingora_error::Error>) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Convenience macro for validation errors
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::core::error::GatewayError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::core::error::GatewayError::Validation(format!($fmt, $($arg)*))
    };
}
