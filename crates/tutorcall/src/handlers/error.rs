use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tutorcall_core::session::{repository_error_to_status_code, RepositoryError};
use tutorcall_core::signing::{signing_error_to_status_code, SigningError};

/// The request itself is unusable: malformed JSON, unknown action, missing input.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BadRequest(pub String);

pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_code(&self) -> StatusCode {
        let code = if let Some(repo_error) = self.0.downcast_ref::<RepositoryError>() {
            repository_error_to_status_code(repo_error)
        } else if let Some(signing_error) = self.0.downcast_ref::<SigningError>() {
            signing_error_to_status_code(signing_error)
        } else if self.0.is::<BadRequest>() {
            400
        } else {
            500
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message safe to return to the caller.
    fn public_message(&self) -> String {
        match self.0.downcast_ref::<RepositoryError>() {
            Some(repo_error) if repo_error.is_client_facing() => repo_error.to_string(),
            Some(_) => "Internal server error".to_string(),
            None if self.0.is::<BadRequest>() => self.0.to_string(),
            None => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (status_code, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
