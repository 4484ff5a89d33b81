use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::warn;

use crate::model::{Claims, CurrentUser, TokenKind, TokenPair, User};
use crate::service::{AuthError, AuthService, CREDENTIAL_ERROR_MSG, LOCKED_MSG};

impl AuthService {
    // ── Cache key layout ──

    pub(crate) fn access_key(&self, sub: &str, token: &str) -> String {
        format!("{}:{}:{}", self.config.token_prefix, sub, token)
    }

    pub(crate) fn refresh_key(&self, sub: &str, token: &str) -> String {
        format!("{}:{}:{}", self.config.refresh_prefix, sub, token)
    }

    pub(crate) fn access_sub_prefix(&self, sub: &str) -> String {
        format!("{}:{}:", self.config.token_prefix, sub)
    }

    pub(crate) fn refresh_sub_prefix(&self, sub: &str) -> String {
        format!("{}:{}:", self.config.refresh_prefix, sub)
    }

    pub(crate) fn snapshot_key(&self, sub: &str) -> String {
        format!("{}:{}", self.config.snapshot_prefix, sub)
    }

    // ── Signing and decoding ──

    /// Sign a JWT for a subject, returning the token and its expiry.
    pub(crate) fn sign_token(
        &self,
        sub: &str,
        kind: TokenKind,
        ttl: i64,
    ) -> Result<(String, chrono::DateTime<chrono::Utc>), AuthError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(ttl);
        let claims = Claims {
            sub: sub.to_string(),
            jti: uuid::Uuid::new_v4().simple().to_string(),
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("JWT encode failed: {}", e)))?;
        Ok((token, exp))
    }

    /// Decode and validate a JWT, rejecting expired tokens (no leeway)
    /// and tokens of the wrong kind.
    pub(crate) fn decode_token(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| AuthError::Token(format!("invalid token: {}", e)))?;

        let claims = data.claims;
        if claims.kind != expected {
            return Err(AuthError::Token("token kind mismatch".into()));
        }
        Ok(claims)
    }

    /// Extract the subject from a token without checking expiry.
    ///
    /// Signature and shape are still verified. Used where an expired
    /// token is acceptable, such as cleanup on logout.
    pub fn lenient_subject(&self, token: &str) -> Option<String> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.validate_exp = false;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|d| d.claims.sub)
    }

    // ── Token pair lifecycle ──

    /// Issue an access/refresh pair for a user and register both in the
    /// cache allow-list.
    ///
    /// For single-session users every previously issued token for the
    /// subject is purged first, so at most one pair stays live.
    pub fn issue_token_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        if !user.is_multi_login {
            self.purge_subject_tokens(&user.id)?;
        }

        let (access_token, access_exp) =
            self.sign_token(&user.id, TokenKind::Access, self.config.access_token_ttl)?;
        let (refresh_token, refresh_exp) =
            self.sign_token(&user.id, TokenKind::Refresh, self.config.refresh_token_ttl)?;

        let pair = TokenPair {
            access_token,
            access_token_expire_time: access_exp.to_rfc3339(),
            refresh_token,
            refresh_token_expire_time: refresh_exp.to_rfc3339(),
        };

        self.kv
            .setex(
                &self.access_key(&user.id, &pair.access_token),
                pair.access_token_expire_time.as_bytes(),
                Duration::from_secs(self.config.access_token_ttl as u64),
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.kv
            .setex(
                &self.refresh_key(&user.id, &pair.refresh_token),
                pair.refresh_token_expire_time.as_bytes(),
                Duration::from_secs(self.config.refresh_token_ttl as u64),
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        Ok(pair)
    }

    /// Verify an access token: valid JWT of the right kind AND still
    /// present in the allow-list. Logout and rotation remove the cache
    /// entry, which kills the token before its JWT expiry.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode_token(token, TokenKind::Access)?;
        let present = self
            .kv
            .get(&self.access_key(&claims.sub, token))
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if present.is_none() {
            return Err(AuthError::Token("token has been revoked".into()));
        }
        Ok(claims)
    }

    /// Rotate a refresh token: consume the presented one and issue a
    /// fresh pair. The accompanying access token, when supplied, is
    /// revoked as well even if already expired.
    pub fn refresh_token_pair(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let claims = self.decode_token(refresh_token, TokenKind::Refresh)?;

        let key = self.refresh_key(&claims.sub, refresh_token);
        let present = self
            .kv
            .get(&key)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if present.is_none() {
            return Err(AuthError::Token("token has been revoked".into()));
        }

        let user: User = self.get_record("users", &claims.sub).map_err(|e| match e {
            AuthError::NotFound(_) => AuthError::NotFound(CREDENTIAL_ERROR_MSG.into()),
            other => other,
        })?;
        if !user.status {
            return Err(AuthError::Unauthorized(LOCKED_MSG.into()));
        }

        // The presented refresh token is single-use.
        self.kv
            .delete(&key)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if let Some(access) = access_token {
            if let Some(sub) = self.lenient_subject(access) {
                if sub == claims.sub {
                    // Best effort: the entry expires on its own anyway.
                    let _ = self.kv.delete(&self.access_key(&sub, access));
                }
            }
        }

        let pair = self.issue_token_pair(&user)?;

        // Rotation re-reads the account, so refresh the snapshot too.
        let roles = self.user_roles(&user.id)?;
        self.write_snapshot(&CurrentUser::from_user(&user, roles))?;

        Ok(pair)
    }

    /// Drop every live token and the identity snapshot for a subject.
    pub fn logout_session(&self, sub: &str) -> Result<(), AuthError> {
        self.purge_subject_tokens(sub)?;
        self.kv
            .delete(&self.snapshot_key(sub))
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(())
    }

    fn purge_subject_tokens(&self, sub: &str) -> Result<(), AuthError> {
        self.kv
            .delete_prefix(&self.access_sub_prefix(sub))
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        self.kv
            .delete_prefix(&self.refresh_sub_prefix(sub))
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Identity snapshots ──

    /// Cache a user's resolved identity for the middleware hot path.
    pub(crate) fn write_snapshot(&self, current: &CurrentUser) -> Result<(), AuthError> {
        let bytes =
            serde_json::to_vec(current).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.kv
            .setex(
                &self.snapshot_key(&current.id),
                &bytes,
                Duration::from_secs(self.config.snapshot_ttl),
            )
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Read a cached identity snapshot. Read failures and corrupt
    /// entries degrade to a miss so the caller falls back to SQL.
    pub(crate) fn load_snapshot(&self, sub: &str) -> Option<CurrentUser> {
        let key = self.snapshot_key(sub);
        let bytes = match self.kv.get(&key) {
            Ok(Some(b)) => b,
            Ok(None) => return None,
            Err(e) => {
                warn!("snapshot read failed for {}: {}", sub, e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(current) => Some(current),
            Err(e) => {
                warn!("discarding corrupt identity snapshot for {}: {}", sub, e);
                None
            }
        }
    }

    /// Resolve the full identity for a verified subject: snapshot if
    /// cached, otherwise users + user_roles with a snapshot write-back.
    pub fn resolve_identity(&self, sub: &str) -> Result<CurrentUser, AuthError> {
        if let Some(current) = self.load_snapshot(sub) {
            return Ok(current);
        }

        let user: User = self.get_record("users", sub)?;
        let roles = self.user_roles(&user.id)?;
        let current = CurrentUser::from_user(&user, roles);

        if let Err(e) = self.write_snapshot(&current) {
            warn!("failed to cache identity snapshot for {}: {}", sub, e);
        }

        Ok(current)
    }
}
