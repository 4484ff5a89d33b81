use axum::extract::{Extension, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use boilerplate_core::ServiceError;

use crate::api::AppState;
use crate::api::middleware::extract_bearer;
use crate::model::{
    ClientMeta, CurrentUser, ForgetPasswordInput, LoginGrant, LoginInput, NewTokenGrant,
    RegisterInput, ResetPasswordInput, TokenPair,
};
use crate::service::AuthConfig;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/token/new", post(new_token))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password/forget", post(forget_password))
        .route("/password/reset", post(reset_password))
}

/// POST /auth/register — create an account and log it in.
async fn register(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RegisterInput>,
) -> Result<Response, ServiceError> {
    let meta = client_meta(&headers);
    let (pair, user) = svc.register(input, &meta).map_err(ServiceError::from)?;
    grant_response(&svc.config, &pair, user)
}

/// POST /auth/login — password login, rate limited per client IP.
async fn login(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginInput>,
) -> Result<Response, ServiceError> {
    let meta = client_meta(&headers);
    svc.check_login_rate(&meta.ip).map_err(ServiceError::from)?;

    let (pair, user) = svc.login(input, &meta).map_err(ServiceError::from)?;
    grant_response(&svc.config, &pair, user)
}

/// POST /auth/token/new — rotate the refresh token from the cookie.
///
/// The Authorization header is optional here; when the old access token
/// is presented it gets revoked along with the consumed refresh token.
async fn new_token(
    State(svc): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let Some(refresh) = parse_cookie(&headers, &svc.config.cookie_name) else {
        return Err(ServiceError::Token("missing refresh token".into()));
    };
    let access = extract_bearer(&headers);

    let pair = svc
        .refresh_token_pair(&refresh, access)
        .map_err(ServiceError::from)?;

    let mut response = Json(NewTokenGrant::from(&pair)).into_response();
    set_cookie(
        &mut response,
        &refresh_cookie(&svc.config.cookie_name, &pair.refresh_token, svc.config.refresh_token_ttl),
    )?;
    Ok(response)
}

/// POST /auth/logout — revoke every live token for the caller.
///
/// Always answers 200 with a cleared cookie: an expired access token
/// still identifies which session to purge, and an unidentifiable
/// caller has nothing left to revoke.
async fn logout(State(svc): State<AppState>, headers: HeaderMap) -> Result<Response, ServiceError> {
    let token = extract_bearer(&headers)
        .map(str::to_string)
        .or_else(|| parse_cookie(&headers, &svc.config.cookie_name));

    if let Some(sub) = token.and_then(|t| svc.lenient_subject(&t)) {
        if let Err(e) = svc.logout_session(&sub) {
            warn!("logout purge failed for {}: {}", sub, e);
        }
    }

    let mut response = Json(json!({"msg": "logged out"})).into_response();
    set_cookie(&mut response, &clear_cookie(&svc.config.cookie_name))?;
    Ok(response)
}

/// GET /auth/me — the caller's resolved identity.
async fn me(user: Option<Extension<CurrentUser>>) -> Result<Json<CurrentUser>, ServiceError> {
    let Some(Extension(user)) = user else {
        return Err(ServiceError::Token("authentication required".into()));
    };
    Ok(Json(user))
}

/// POST /auth/password/forget — request a reset token.
///
/// Answers identically whether or not the account exists.
async fn forget_password(
    State(svc): State<AppState>,
    Json(input): Json<ForgetPasswordInput>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.forget_password(&input.email).map_err(ServiceError::from)?;
    Ok(Json(json!({
        "msg": "if the account exists, a reset token has been issued"
    })))
}

/// POST /auth/password/reset — redeem a reset token.
async fn reset_password(
    State(svc): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    svc.reset_password(
        &input.email,
        &input.token,
        &input.new_password,
        &input.confirm_password,
    )
    .map_err(ServiceError::from)?;
    Ok(Json(json!({"msg": "password updated"})))
}

// ── Request metadata and cookies ──

/// Client IP (from proxy headers) and user agent for audit rows.
pub(crate) fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ClientMeta { ip, user_agent }
}

/// 200 response with the login grant body and the refresh cookie.
fn grant_response(
    config: &AuthConfig,
    pair: &TokenPair,
    user: CurrentUser,
) -> Result<Response, ServiceError> {
    let mut response = Json(LoginGrant::new(pair, user)).into_response();
    set_cookie(
        &mut response,
        &refresh_cookie(&config.cookie_name, &pair.refresh_token, config.refresh_token_ttl),
    )?;
    Ok(response)
}

fn set_cookie(response: &mut Response, cookie: &str) -> Result<(), ServiceError> {
    let value = HeaderValue::from_str(cookie).map_err(|e| ServiceError::Server(e.to_string()))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(())
}

/// The refresh token travels in an HttpOnly cookie, scoped to the whole
/// site so the refresh endpoint sees it regardless of frontend routing.
fn refresh_cookie(name: &str, token: &str, max_age: i64) -> String {
    let expires = (chrono::Utc::now() + chrono::Duration::seconds(max_age))
        .format("%a, %d %b %Y %H:%M:%S GMT");
    format!(
        "{}={}; Path=/; Max-Age={}; Expires={}; HttpOnly; SameSite=None",
        name, token, max_age, expires
    )
}

fn clear_cookie(name: &str) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=None",
        name
    )
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in raw.split(';') {
        if let Some((k, v)) = part.trim().split_once('=') {
            if k == name {
                return Some(v.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_shape() {
        let cookie = refresh_cookie("boilerplate_refresh_token", "tok123", 604800);
        assert!(cookie.starts_with("boilerplate_refresh_token=tok123; "));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=None"));
        assert!(cookie.contains("GMT"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie("boilerplate_refresh_token");
        assert!(cookie.starts_with("boilerplate_refresh_token=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("1970"));
    }

    #[test]
    fn test_parse_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_cookie(&headers, "session"), None);

        headers.insert(
            header::COOKIE,
            "theme=dark; session=abc123; lang=en".parse().unwrap(),
        );
        assert_eq!(parse_cookie(&headers, "session"), Some("abc123".to_string()));
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_client_meta_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.7".parse().unwrap());
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 198.51.100.7".parse().unwrap(),
        );
        headers.insert(header::USER_AGENT, "curl/8".parse().unwrap());

        let meta = client_meta(&headers);
        assert_eq!(meta.ip, "203.0.113.9");
        assert_eq!(meta.user_agent, "curl/8");
    }

    #[test]
    fn test_client_meta_without_proxy_headers() {
        let meta = client_meta(&HeaderMap::new());
        assert!(meta.ip.is_empty());
        assert!(meta.user_agent.is_empty());
    }
}
