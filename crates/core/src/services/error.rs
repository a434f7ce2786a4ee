use thiserror::Error;

/// Errors reported by an external AI service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned an unusable response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

/// Result type for service calls.
pub type Result<T> = std::result::Result<T, ServiceError>;
