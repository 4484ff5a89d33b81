use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use boilerplate_core::ServiceError;

use crate::api::AppState;
use crate::service::AuthConfig;

/// JWT authentication middleware.
///
/// Public paths pass through untouched. Elsewhere a Bearer token, when
/// present, must verify against the allow-list; the resolved identity
/// is then stored as a CurrentUser extension. Requests without a token
/// continue unauthenticated and the permission guard decides their
/// fate, so purely public deployments need no special casing here.
pub async fn auth_middleware(
    State(svc): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();

    if is_public_path(&svc.config, &path) {
        return next.run(req).await;
    }

    let Some(token) = extract_bearer(req.headers()).map(str::to_string) else {
        return next.run(req).await;
    };

    let claims = match svc.verify_access_token(&token) {
        Ok(claims) => claims,
        Err(e) => return ServiceError::from(e).into_response(),
    };

    match svc.resolve_identity(&claims.sub) {
        Ok(current) => {
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        Err(e) => ServiceError::from(e).into_response(),
    }
}

/// Extract the Bearer token from the Authorization header.
pub(crate) fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Check if a path is served without authentication (exact match).
pub(crate) fn is_public_path(config: &AuthConfig, path: &str) -> bool {
    config.public_paths.iter().any(|p| p == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert("authorization", "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));

        headers.insert("authorization", "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);

        // The scheme is case sensitive.
        headers.insert("authorization", "bearer abc".parse().unwrap());
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn test_public_paths_are_exact() {
        let config = AuthConfig::default();
        assert!(is_public_path(&config, "/auth/login"));
        assert!(is_public_path(&config, "/health"));
        assert!(!is_public_path(&config, "/auth/login/extra"));
        assert!(!is_public_path(&config, "/auth/policies"));
    }
}
