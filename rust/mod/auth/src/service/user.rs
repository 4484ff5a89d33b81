use boilerplate_core::{new_id, now_rfc3339};
use boilerplate_sql::Value;

use tracing::{info, warn};

use crate::model::{
    ClientMeta, CreateLoginLog, CurrentUser, LOGIN_STATUS_FAILURE, LOGIN_STATUS_SUCCESS,
    LoginInput, RegisterInput, SecureToken, TokenPair, TokenPurpose, User,
};
use crate::service::{AuthError, AuthService, CREDENTIAL_ERROR_MSG, LOCKED_MSG};
use crate::store_impls::{generate_salt, hash_password, verify_password};

impl AuthService {
    /// Register a new account and log it in immediately.
    pub fn register(
        &self,
        input: RegisterInput,
        meta: &ClientMeta,
    ) -> Result<(TokenPair, CurrentUser), AuthError> {
        if input.password.is_empty() {
            return Err(AuthError::Validation("password must not be empty".into()));
        }
        if self.get_user_by_email(&input.email)?.is_some() {
            return Err(AuthError::Conflict("email already registered".into()));
        }

        let salt = generate_salt();
        let hash = hash_password(&format!("{}{}", input.password, salt))?;

        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            email: input.email,
            password: hash,
            salt,
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
            msg: "register".to_string(),
        });

        Ok((pair, current))
    }

    /// Authenticate with email and password.
    ///
    /// Unknown emails and wrong passwords surface the same message so
    /// the response does not reveal which accounts exist. Unknown
    /// emails are not audited; there is no user to attribute them to.
    pub fn login(
        &self,
        input: LoginInput,
        meta: &ClientMeta,
    ) -> Result<(TokenPair, CurrentUser), AuthError> {
        let Some(mut user) = self.get_user_by_email(&input.email)? else {
            return Err(AuthError::NotFound(CREDENTIAL_ERROR_MSG.into()));
        };

        if !verify_password(&format!("{}{}", input.password, user.salt), &user.password) {
            self.emit_login_log(CreateLoginLog {
                user_id: user.id.clone(),
                email: user.email.clone(),
                status: LOGIN_STATUS_FAILURE,
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
                msg: "incorrect password".to_string(),
            });
            return Err(AuthError::Unauthorized(CREDENTIAL_ERROR_MSG.into()));
        }

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
            msg: "login success".to_string(),
        });

        Ok((pair, current))
    }

    /// Get a user by id.
    pub fn get_user(&self, id: &str) -> Result<User, AuthError> {
        self.get_record("users", id)
    }

    /// Look up a user by email via the indexed column.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let rows = self
            .sql
            .query(
                "SELECT data FROM users WHERE email = ?1",
                &[Value::Text(email.to_string())],
            )
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let data = row
            .get_str("data")
            .ok_or_else(|| AuthError::Internal("missing data column".into()))?;
        let user = serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))?;
        Ok(Some(user))
    }

    /// Stamp last_login_at and persist, updating the caller's copy.
    pub(crate) fn update_login_time(&self, user: &mut User) -> Result<(), AuthError> {
        let now = now_rfc3339();
        user.last_login_at = Some(now.clone());
        user.updated_at = now.clone();
        let id = user.id.clone();
        self.update_record("users", &id, user, &[("updated_at", Value::Text(now))])
    }

    /// Create the root account from an already hashed credential.
    ///
    /// The salt stays empty: root's password was hashed outside the
    /// service, so verification runs over the bare password.
    pub fn create_root_user(&self, email: &str, password_hash: &str) -> Result<User, AuthError> {
        let now = now_rfc3339();
        let user = User {
            id: new_id(),
            email: email.to_string(),
            password: password_hash.to_string(),
            salt: String::new(),
            status: true,
            is_superuser: true,
            is_staff: true,
            is_multi_login: true,
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

        Ok(user)
    }

    /// Start a password reset. Unknown emails return Ok(None) so the
    /// endpoint answers identically either way.
    pub fn forget_password(&self, email: &str) -> Result<Option<SecureToken>, AuthError> {
        let Some(user) = self.get_user_by_email(email)? else {
            return Ok(None);
        };

        let token = self.generate_secure_token(&user.id, TokenPurpose::ResetPassword)?;
        info!("password reset token issued for user {}", user.id);
        Ok(Some(token))
    }

    /// Complete a password reset with a one-time token, then revoke
    /// every live session for the account.
    pub fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::Validation("password must not be empty".into()));
        }
        if new_password != confirm_password {
            return Err(AuthError::Validation("passwords do not match".into()));
        }

        let Some(mut user) = self.get_user_by_email(email)? else {
            return Err(AuthError::NotFound("invalid reset request".into()));
        };

        self.redeem_secure_token(&user.id, TokenPurpose::ResetPassword, token)?;

        let now = now_rfc3339();
        user.password = hash_password(&format!("{}{}", new_password, user.salt))?;
        user.updated_at = now.clone();
        self.update_record("users", &user.id, &user, &[("updated_at", Value::Text(now))])?;

        self.logout_session(&user.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AuthConfig;
    use boilerplate_core::ServiceError;
    use boilerplate_sql::sqlite::SqliteStore;

    fn test_service() -> std::sync::Arc<AuthService> {
        let sql = std::sync::Arc::new(SqliteStore::open_in_memory().unwrap());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = std::sync::Arc::new(boilerplate_kv::redb::RedbStore::open(tmp.path()).unwrap());
        AuthService::new(sql, kv, AuthConfig::default()).unwrap()
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "secret123".to_string(),
        }
    }

    #[test]
    fn test_register_and_login() {
        let svc = test_service();

        let (pair, current) = svc
            .register(register_input("alice@example.com"), &ClientMeta::default())
            .unwrap();
        assert!(!pair.access_token.is_empty());
        assert_eq!(current.email, "alice@example.com");

        let (_, current) = svc
            .login(
                LoginInput {
                    email: "alice@example.com".to_string(),
                    password: "secret123".to_string(),
                },
                &ClientMeta::default(),
            )
            .unwrap();
        assert!(current.last_login_at.is_some());
    }

    #[test]
    fn test_register_duplicate_email() {
        let svc = test_service();
        svc.register(register_input("bob@example.com"), &ClientMeta::default())
            .unwrap();

        let err = svc
            .register(register_input("bob@example.com"), &ClientMeta::default())
            .unwrap_err();
        assert!(matches!(err, AuthError::Conflict(_)));
    }

    #[test]
    fn test_register_empty_password() {
        let svc = test_service();
        let err = svc
            .register(
                RegisterInput {
                    email: "carol@example.com".to_string(),
                    password: String::new(),
                },
                &ClientMeta::default(),
            )
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn test_login_does_not_reveal_which_accounts_exist() {
        let svc = test_service();
        svc.register(register_input("dave@example.com"), &ClientMeta::default())
            .unwrap();

        let unknown = svc
            .login(
                LoginInput {
                    email: "nobody@example.com".to_string(),
                    password: "whatever".to_string(),
                },
                &ClientMeta::default(),
            )
            .unwrap_err();
        let wrong = svc
            .login(
                LoginInput {
                    email: "dave@example.com".to_string(),
                    password: "wrong-password".to_string(),
                },
                &ClientMeta::default(),
            )
            .unwrap_err();

        // Different status codes, byte-identical message.
        assert!(matches!(unknown, AuthError::NotFound(_)));
        assert!(matches!(wrong, AuthError::Unauthorized(_)));
        assert_eq!(
            ServiceError::from(unknown).to_string(),
            ServiceError::from(wrong).to_string(),
        );
    }

    #[test]
    fn test_locked_account_cannot_login() {
        let svc = test_service();
        let (_, current) = svc
            .register(register_input("erin@example.com"), &ClientMeta::default())
            .unwrap();

        let mut user = svc.get_user(&current.id).unwrap();
        user.status = false;
        svc.update_record("users", &user.id, &user, &[("status", Value::Integer(0))])
            .unwrap();
        // The stale snapshot must not shadow the lock at login.
        svc.logout_session(&user.id).unwrap();

        let err = svc
            .login(
                LoginInput {
                    email: "erin@example.com".to_string(),
                    password: "secret123".to_string(),
                },
                &ClientMeta::default(),
            )
            .unwrap_err();
        match err {
            AuthError::Unauthorized(msg) => assert!(msg.contains("locked")),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn test_forget_password_unknown_email_is_silent() {
        let svc = test_service();
        assert!(svc.forget_password("ghost@example.com").unwrap().is_none());
    }

    #[test]
    fn test_reset_password_flow() {
        let svc = test_service();
        let (pair, _) = svc
            .register(register_input("frank@example.com"), &ClientMeta::default())
            .unwrap();

        let token = svc.forget_password("frank@example.com").unwrap().unwrap();

        let err = svc
            .reset_password("frank@example.com", &token.token, "newpass456", "different")
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        svc.reset_password("frank@example.com", &token.token, "newpass456", "newpass456")
            .unwrap();

        // Every pre-reset session is gone.
        assert!(svc.verify_access_token(&pair.access_token).is_err());

        // The old password no longer authenticates, the new one does.
        assert!(
            svc.login(
                LoginInput {
                    email: "frank@example.com".to_string(),
                    password: "secret123".to_string(),
                },
                &ClientMeta::default(),
            )
            .is_err()
        );
        svc.login(
            LoginInput {
                email: "frank@example.com".to_string(),
                password: "newpass456".to_string(),
            },
            &ClientMeta::default(),
        )
        .unwrap();
    }
}
