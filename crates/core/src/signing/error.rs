use thiserror::Error;

/// Errors that can occur while presigning a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// A required credential is absent; nothing was hashed.
    #[error("Missing signing credential: {0}")]
    MissingCredentials(&'static str),

    #[error("Invalid HMAC key: {0}")]
    InvalidKey(String),
}

/// Maps a [`SigningError`] to an HTTP status code.
///
/// Signing only fails on server misconfiguration, so every variant is a 500.
pub fn signing_error_to_status_code(error: &SigningError) -> u16 {
    match error {
        SigningError::MissingCredentials(_) | SigningError::InvalidKey(_) => 500,
    }
}
