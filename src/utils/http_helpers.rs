use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use crate::error::{AppError, ValidationError};

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
///
/// The body is always `{"error": "<message>"}`.
pub struct HTTPError {
    status: StatusCode,
    message: String,
    challenge: Option<String>,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    /// `challenge` becomes the `WWW-Authenticate` header when present.
    pub fn new(status: StatusCode, message: impl Into<String>, challenge: Option<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            challenge,
        }
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(json!({ "error": self.message }))).into_response();
        if let Some(challenge) = self.challenge {
            match HeaderValue::from_str(&challenge) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => tracing::warn!("Dropping invalid challenge header: {}", e),
            }
        }
        response
    }
}

/// `Json<T>` whose rejections are reported as a `{"error": ...}` validation
/// failure instead of axum's plain-text body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                Err(ValidationError::MalformedBody(rejection.body_text()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_body_is_json_escaped() {
        let response = HTTPError::new(StatusCode::BAD_REQUEST, r#"bad "input""#, None).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], r#"bad "input""#);
    }

    #[test]
    fn test_challenge_header_is_set() {
        let response = HTTPError::new(
            StatusCode::UNAUTHORIZED,
            "authentication required",
            Some("Bearer".to_string()),
        )
        .into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[derive(serde::Deserialize)]
    struct CodeBody {
        #[allow(dead_code)]
        code: String,
    }

    fn json_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_json_body_mistyped_field_is_validation_error() {
        let result = JsonBody::<CodeBody>::from_request(json_request(r#"{"code":5}"#), &()).await;
        let err = result.err().expect("mistyped body must be rejected");
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::MalformedBody(_))
        ));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request body"));
    }

    #[tokio::test]
    async fn test_json_body_accepts_valid_input() {
        let result = JsonBody::<CodeBody>::from_request(json_request(r#"{"code":"abc"}"#), &()).await;
        assert!(result.is_ok());
    }
}
