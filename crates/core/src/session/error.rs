use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
    #[error("Access denied to {entity_type}: {id}")]
    AccessDenied {
        entity_type: &'static str,
        id: String,
    },
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Returns true for errors whose message is safe to show to the caller.
    ///
    /// Store and data errors carry backend details and are reported as an
    /// opaque failure instead.
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            RepositoryError::Validation(_)
                | RepositoryError::NotFound { .. }
                | RepositoryError::AccessDenied { .. }
                | RepositoryError::AlreadyExists { .. }
        )
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
