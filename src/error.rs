//! Typed errors shared by the exchange, session and mailbox services.
//!
//! Every variant maps to exactly one HTTP status and one user-facing message.
//! Upstream bodies and store diagnostics are logged where the error is raised
//! and never leave the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::utils::http_helpers::HTTPError;

/// A client-side rule violated by a registration or message submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("sender must not be empty")]
    EmptySender,
    #[error("sender must be at most {max} characters")]
    SenderTooLong { max: usize },
    #[error("content must not be empty")]
    EmptyContent,
    #[error("content must be at most {max} characters")]
    ContentTooLong { max: usize },
    #[error("envelope type must be between 1 and 6, got {0}")]
    InvalidEnvelope(i64),
    #[error("tree owner id must not be empty")]
    EmptyOwner,
    #[error("all fields are required")]
    MissingField,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },
    #[error("authorization code must not be empty")]
    EmptyCode,
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The provider rejected the code exchange. Transport failures carry 502.
    #[error("token endpoint returned {status}")]
    UpstreamToken { status: u16, body: String },

    /// The access token was issued but the profile could not be fetched.
    #[error("profile endpoint returned {status}")]
    UpstreamProfile { status: u16, body: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("message could not be stored: {0}")]
    WriteFailure(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("unknown provider '{0}'")]
    ProviderNotFound(String),

    #[error("email already in use")]
    EmailInUse,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("session error: {0}")]
    Session(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UpstreamToken { .. }
            | AppError::UpstreamProfile { .. }
            | AppError::Session(_)
            | AppError::Store(_)
            | AppError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::WriteFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::AuthRequired | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailInUse => StatusCode::CONFLICT,
        }
    }

    /// The text shown to end users.
    pub fn public_message(&self) -> String {
        match self {
            AppError::UpstreamToken { .. } | AppError::UpstreamProfile { .. } => {
                "Login with the identity provider failed, please try again".to_string()
            }
            AppError::Session(_) | AppError::Store(_) | AppError::Backend(_) => {
                "Internal server error".to_string()
            }
            AppError::WriteFailure(_) => {
                "Sending the message failed, please try again".to_string()
            }
            AppError::Validation(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let challenge = match self {
            AppError::AuthRequired => Some("Bearer".to_string()),
            _ => None,
        };
        HTTPError::new(self.status(), self.public_message(), challenge).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_body_is_not_exposed() {
        let err = AppError::UpstreamToken {
            status: 400,
            body: r#"{"error":"invalid_grant","error_description":"authorization code not found"}"#
                .to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("invalid_grant"));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = AppError::from(ValidationError::ContentTooLong { max: 1000 });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.public_message(),
            "content must be at most 1000 characters"
        );
    }

    #[test]
    fn test_write_failure_is_retryable() {
        let err = AppError::WriteFailure("connection reset".to_string());
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.public_message().contains("try again"));
    }
}
