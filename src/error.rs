//! Crate-wide error taxonomy and HTTP mapping.
//!
//! Every fallible operation returns [`Error`]; handlers bubble it with `?`
//! and the [`IntoResponse`] impl maps each kind to a status code and a JSON
//! `{"message": ...}` body. Internal failures are logged server-side and
//! reported as a generic server error, never leaked verbatim.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};

/// Stable error kinds for the task-board operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed request fields, or a foreign-key target that
    /// does not exist.
    #[error("{0}")]
    InvalidInput(String),

    /// An entity id did not resolve.
    #[error("{0}")]
    NotFound(String),

    /// Authenticated, but not authorized for the target entity.
    #[error("{0}")]
    Forbidden(String),

    /// The operation conflicts with existing state (e.g. deleting a stage
    /// that still has tasks).
    #[error("{0}")]
    Conflict(String),

    /// The AI capability returned a payload that is not strict JSON for the
    /// expected schema.
    #[error("Invalid AI response: {0}")]
    InvalidAiResponse(String),

    /// Persistence or infrastructure failure.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidAiResponse(_) | Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unexpected(err) => {
                tracing::error!("Unexpected error: {:#}", err);
                "Server error".to_string()
            }
            Self::InvalidAiResponse(detail) => {
                tracing::error!("AI response rejected: {}", detail);
                self.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        assert_eq!(
            Error::invalid_input("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(Error::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            Error::InvalidAiResponse("junk".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Unexpected(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
