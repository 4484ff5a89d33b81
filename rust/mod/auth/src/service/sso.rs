use async_trait::async_trait;

use boilerplate_core::{new_id, now_rfc3339};
use boilerplate_sql::Value;
use tracing::{info, warn};

use crate::model::{
    ClientMeta, CreateLoginLog, CurrentUser, LOGIN_STATUS_FAILURE, LOGIN_STATUS_SUCCESS,
    SsoProfile, TokenPair, User,
};
use crate::service::{AuthError, AuthService, LOCKED_MSG};

/// Bridge to an external identity provider. Implementations exchange
/// an authorization code for the provider's access token and fetch the
/// profile behind it; the service handles the rest of the login.
#[async_trait]
pub trait SsoAdapter: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError>;
    async fn fetch_profile(&self, access_token: &str) -> Result<SsoProfile, AuthError>;
}

impl AuthService {
    /// Complete an SSO handoff: run the code exchange through the
    /// adapter, then log the profile in.
    pub async fn login_with_sso(
        &self,
        adapter: &dyn SsoAdapter,
        code: &str,
        meta: &ClientMeta,
    ) -> Result<(TokenPair, CurrentUser), AuthError> {
        let provider_token = adapter.exchange_code(code).await?;
        let profile = adapter.fetch_profile(&provider_token).await?;
        self.login_with_sso_profile(profile, meta)
    }

    /// Log in a provider-verified profile, linking by email. A first
    /// visit provisions an account without a local credential, so
    /// password login stays impossible for it.
    pub fn login_with_sso_profile(
        &self,
        profile: SsoProfile,
        meta: &ClientMeta,
    ) -> Result<(TokenPair, CurrentUser), AuthError> {
        if profile.email.is_empty() {
            return Err(AuthError::Validation("provider returned no email".into()));
        }

        let mut user = match self.get_user_by_email(&profile.email)? {
            Some(user) => user,
            None => self.provision_sso_user(&profile)?,
        };

        if !user.status {
            self.emit_login_log(CreateLoginLog {
                user_id: user.id.clone(),
                email: user.email.clone(),
                status: LOGIN_STATUS_FAILURE,
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
                msg: "account locked".to_string(),
            });
            return Err(AuthError::Unauthorized(LOCKED_MSG.into()));
        }

        self.update_login_time(&mut user)?;

        let pair = self.issue_token_pair(&user)?;
        let roles = self.user_roles(&user.id)?;
        let current = CurrentUser::from_user(&user, roles);
        self.write_snapshot(&current)?;

        self.emit_login_log(CreateLoginLog {
            user_id: user.id.clone(),
            email: user.email.clone(),
            status: LOGIN_STATUS_SUCCESS,
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            msg: "sso login".to_string(),
        });

        Ok((pair, current))
    }

    fn provision_sso_user(&self, profile: &SsoProfile) -> Result<User, AuthError> {
        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            email: profile.email.clone(),
            password: String::new(),
            salt: String::new(),
            status: true,
            is_superuser: false,
            is_staff: false,
            is_multi_login: false,
            last_login_at: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        self.insert_record(
            "users",
            &user.id,
            &user,
            &[
                ("email", Value::Text(user.email.clone())),
                ("status", Value::Integer(1)),
                ("created_at", Value::Text(now.clone())),
                ("updated_at", Value::Text(now)),
            ],
        )?;

        match self.get_role_by_name(&self.config.default_role)? {
            Some(role) => self.assign_role(&user.id, &role.id)?,
            None => warn!(
                "default role {:?} does not exist, user {} starts with no roles",
                self.config.default_role, user.id
            ),
        }

        info!("provisioned account {} from sso profile", user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LoginInput;
    use crate::service::AuthConfig;
    use boilerplate_sql::sqlite::SqliteStore;

    fn test_service() -> std::sync::Arc<AuthService> {
        let sql = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = std::sync::Arc::new(boilerplate_kv::redb::RedbStore::open(tmp.path()).unwrap());
        AuthService::new(sql, kv, AuthConfig::default()).unwrap()
    }

    struct FakeAdapter;

    #[async_trait]
    impl SsoAdapter for FakeAdapter {
        async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
            if code == "good-code" {
                Ok("provider-token".to_string())
            } else {
                Err(AuthError::Unauthorized("code exchange failed".into()))
            }
        }

        async fn fetch_profile(&self, access_token: &str) -> Result<SsoProfile, AuthError> {
            assert_eq!(access_token, "provider-token");
            Ok(SsoProfile {
                external_id: "ext-1".to_string(),
                email: "sso@example.com".to_string(),
                firstname: "S".to_string(),
                lastname: "O".to_string(),
                picture: None,
            })
        }
    }

    #[tokio::test]
    async fn test_first_sso_login_provisions_account() {
        let svc = test_service();

        let (pair, current) = svc
            .login_with_sso(&FakeAdapter, "good-code", &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(current.email, "sso@example.com");
        assert!(svc.verify_access_token(&pair.access_token).is_ok());

        // Second login links to the same account.
        let (_, again) = svc
            .login_with_sso(&FakeAdapter, "good-code", &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(again.id, current.id);

        // No local credential: password login is impossible.
        assert!(
            svc.login(
                LoginInput {
                    email: "sso@example.com".to_string(),
                    password: String::new(),
                },
                &ClientMeta::default(),
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_bad_code_is_rejected() {
        let svc = test_service();
        let err = svc
            .login_with_sso(&FakeAdapter, "bad-code", &ClientMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized(_)));
    }
}
