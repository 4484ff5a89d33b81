use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Unified error type shared by services and API handlers.
///
/// Every variant maps onto exactly one HTTP status. API responses render the
/// `{code, msg, data}` envelope where `code` repeats the numeric status and
/// `data` is always null for errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or unacceptable input (400).
    #[error("{0}")]
    Validation(String),

    /// Entity does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation, e.g. duplicate email (409).
    #[error("{0}")]
    Conflict(String),

    /// Authenticated but not allowed, or the account is locked (401).
    #[error("{0}")]
    Authorization(String),

    /// Hard privilege restriction (403).
    #[error("{0}")]
    Forbidden(String),

    /// Missing, malformed, expired, or revoked credentials (401).
    /// The response carries `WWW-Authenticate: Bearer`.
    #[error("{0}")]
    Token(String),

    /// Rate limit exceeded (429). The response carries `Retry-After`.
    #[error("{msg}")]
    TooManyRequests { msg: String, retry_after: u64 },

    /// Unexpected internal failure (500).
    #[error("{0}")]
    Server(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Authorization(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Token(_) => StatusCode::UNAUTHORIZED,
            ServiceError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": status.as_u16(),
            "msg": self.to_string(),
            "data": serde_json::Value::Null,
        });
        let mut response = (status, axum::Json(body)).into_response();
        match &self {
            ServiceError::Token(_) => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            ServiceError::TooManyRequests { retry_after, .. } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            _ => {}
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(
            ServiceError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Authorization("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::Token("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::TooManyRequests {
                msg: "x".into(),
                retry_after: 5
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ServiceError::Server("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_display_is_just_message() {
        let e = ServiceError::NotFound("user/abc123".into());
        assert_eq!(e.to_string(), "user/abc123");
    }

    #[test]
    fn token_response_carries_www_authenticate() {
        let response = ServiceError::Token("token has expired".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let response = ServiceError::TooManyRequests {
            msg: "too many login attempts".into(),
            retry_after: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[tokio::test]
    async fn envelope_code_matches_status() {
        let response = ServiceError::Conflict("email already registered".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["code"], 409);
        assert_eq!(value["msg"], "email already registered");
        assert!(value["data"].is_null());
    }
}
