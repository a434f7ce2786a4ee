//! Pure functions for mapping repository errors to HTTP status codes.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `Validation` -> 400 (Bad Request)
/// - `NotFound` -> 404 (Not Found)
/// - `AccessDenied` -> 403 (Forbidden)
/// - `AlreadyExists` -> 409 (Conflict)
/// - `Upstream`, `Serialization`, `InvalidData` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use tutorcall_core::session::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "ConversationSession",
///     id: "abc-123".to_string(),
/// };
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::Validation(_) => 400,
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::AccessDenied { .. } => 403,
        RepositoryError::AlreadyExists { .. } => 409,
        RepositoryError::Upstream(_) => 500,
        RepositoryError::Serialization(_) => 500,
        RepositoryError::InvalidData(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let error = RepositoryError::Validation("sessionId is required".to_string());
        assert_eq!(repository_error_to_status_code(&error), 400);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let error = RepositoryError::NotFound {
            entity_type: "ConversationSession",
            id: "s-123".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&error), 404);
    }

    #[test]
    fn test_access_denied_maps_to_403() {
        let error = RepositoryError::AccessDenied {
            entity_type: "ConversationSession",
            id: "s-123".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&error), 403);
    }

    #[test]
    fn test_already_exists_maps_to_409() {
        let error = RepositoryError::AlreadyExists {
            entity_type: "ConversationSession",
            id: "s-456".to_string(),
        };
        assert_eq!(repository_error_to_status_code(&error), 409);
    }

    #[test]
    fn test_store_failures_map_to_500() {
        for error in [
            RepositoryError::Upstream("throughput exceeded".to_string()),
            RepositoryError::Serialization("bad json".to_string()),
            RepositoryError::InvalidData("missing field".to_string()),
        ] {
            assert_eq!(repository_error_to_status_code(&error), 500);
        }
    }
}
