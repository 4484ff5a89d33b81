use serde::{Deserialize, Serialize};

use super::CurrentUser;

/// Distinguishes access tokens from refresh tokens inside the JWT.
/// Presenting one kind where the other is expected is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Unique token id. Keeps tokens signed in the same second distinct.
    pub jti: String,
    /// Token kind.
    pub kind: TokenKind,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
}

/// A freshly issued access/refresh pair. Expiry times are RFC 3339.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expire_time: String,
    pub refresh_token: String,
    pub refresh_token_expire_time: String,
}

/// Response body for login and registration. The refresh token travels
/// in the cookie, never in the body.
#[derive(Debug, Clone, Serialize)]
pub struct LoginGrant {
    pub access_token: String,
    pub token_type: String,
    pub access_token_expire_time: String,
    pub user: CurrentUser,
}

impl LoginGrant {
    pub fn new(pair: &TokenPair, user: CurrentUser) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            token_type: "Bearer".to_string(),
            access_token_expire_time: pair.access_token_expire_time.clone(),
            user,
        }
    }
}

/// Response body for the refresh endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct NewTokenGrant {
    pub access_token: String,
    pub token_type: String,
    pub access_token_expire_time: String,
}

impl From<&TokenPair> for NewTokenGrant {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access_token: pair.access_token.clone(),
            token_type: "Bearer".to_string(),
            access_token_expire_time: pair.access_token_expire_time.clone(),
        }
    }
}
