use std::time::Duration;

use crate::model::{SecureToken, TokenPurpose};
use crate::service::{AuthError, AuthService};
use crate::store_impls::generate_token_value;

impl AuthService {
    pub(crate) fn secure_token_key(&self, user_id: &str, purpose: TokenPurpose) -> String {
        format!(
            "{}:{}:{}",
            self.config.secure_token_prefix,
            user_id,
            purpose.as_str()
        )
    }

    /// Issue a one-time token for a user and purpose. A user holds at
    /// most one live token per purpose; issuing again replaces it.
    pub fn generate_secure_token(
        &self,
        user_id: &str,
        purpose: TokenPurpose,
    ) -> Result<SecureToken, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let doc = SecureToken {
            token: generate_token_value(),
            purpose,
            user_id: user_id.to_string(),
            used: false,
            expiration: now + self.config.secure_token_ttl as i64,
        };

        let bytes = serde_json::to_vec(&doc).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.kv
            .setex(
                &self.secure_token_key(user_id, purpose),
                &bytes,
                Duration::from_secs(self.config.secure_token_ttl),
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        Ok(doc)
    }

    /// Redeem a one-time token. The used flag is flipped with a
    /// compare-and-swap on the stored document, so two concurrent
    /// redemptions cannot both succeed.
    pub fn redeem_secure_token(
        &self,
        user_id: &str,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<(), AuthError> {
        let key = self.secure_token_key(user_id, purpose);
        let raw = self
            .kv
            .get(&key)
            .map_err(|e| AuthError::Storage(e.to_string()))?
            .ok_or_else(|| AuthError::Token("token has expired".into()))?;

        let stored: SecureToken = serde_json::from_slice(&raw)
            .map_err(|_| AuthError::Token("token is invalid".into()))?;

        if stored.used {
            return Err(AuthError::Token("token has already been used".into()));
        }
        if stored.expiration < chrono::Utc::now().timestamp() {
            return Err(AuthError::Token("token has expired".into()));
        }
        if stored.purpose != purpose {
            return Err(AuthError::Token("token purpose mismatch".into()));
        }
        if stored.token != token {
            return Err(AuthError::Token("token is invalid".into()));
        }

        let mut used = stored;
        used.used = true;
        let new_bytes =
            serde_json::to_vec(&used).map_err(|e| AuthError::Internal(e.to_string()))?;

        let swapped = self
            .kv
            .compare_and_swap(&key, &raw, &new_bytes)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if !swapped {
            return Err(AuthError::Token("token has already been used".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AuthConfig;
    use boilerplate_sql::sqlite::SqliteStore;

    fn test_service_with(config: AuthConfig) -> std::sync::Arc<AuthService> {
        let sql = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = std::sync::Arc::new(boilerplate_kv::redb::RedbStore::open(tmp.path()).unwrap());
        AuthService::new(sql, kv, config).unwrap()
    }

    fn test_service() -> std::sync::Arc<AuthService> {
        test_service_with(AuthConfig::default())
    }

    #[test]
    fn test_token_is_single_use() {
        let svc = test_service();
        let doc = svc
            .generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();

        svc.redeem_secure_token("u1", TokenPurpose::ResetPassword, &doc.token)
            .unwrap();

        let err = svc
            .redeem_secure_token("u1", TokenPurpose::ResetPassword, &doc.token)
            .unwrap_err();
        assert!(err.to_string().contains("used"));
    }

    #[test]
    fn test_wrong_token_value() {
        let svc = test_service();
        svc.generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();

        let err = svc
            .redeem_secure_token("u1", TokenPurpose::ResetPassword, "bogus")
            .unwrap_err();
        assert!(err.to_string().contains("invalid"));

        // A failed redemption does not consume the token.
        let doc = svc
            .generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();
        svc.redeem_secure_token("u1", TokenPurpose::ResetPassword, &doc.token)
            .unwrap();
    }

    #[test]
    fn test_purposes_are_isolated() {
        let svc = test_service();
        let doc = svc
            .generate_secure_token("u1", TokenPurpose::ConfirmEmail)
            .unwrap();

        // A confirm-email token cannot reset a password.
        assert!(
            svc.redeem_secure_token("u1", TokenPurpose::ResetPassword, &doc.token)
                .is_err()
        );

        // It still works for its own purpose.
        svc.redeem_secure_token("u1", TokenPurpose::ConfirmEmail, &doc.token)
            .unwrap();
    }

    #[test]
    fn test_expired_token() {
        let svc = test_service_with(AuthConfig {
            secure_token_ttl: 0,
            ..AuthConfig::default()
        });
        let doc = svc
            .generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();

        let err = svc
            .redeem_secure_token("u1", TokenPurpose::ResetPassword, &doc.token)
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_reissue_replaces_previous_token() {
        let svc = test_service();
        let first = svc
            .generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();
        let second = svc
            .generate_secure_token("u1", TokenPurpose::ResetPassword)
            .unwrap();
        assert_ne!(first.token, second.token);

        assert!(
            svc.redeem_secure_token("u1", TokenPurpose::ResetPassword, &first.token)
                .is_err()
        );
        svc.redeem_secure_token("u1", TokenPurpose::ResetPassword, &second.token)
            .unwrap();
    }
}
