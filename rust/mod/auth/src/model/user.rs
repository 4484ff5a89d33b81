use serde::{Deserialize, Serialize};

use super::Role;

/// A user account. The id doubles as the JWT subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (UUIDv7, no dashes).
    pub id: String,

    /// Email address, unique across all accounts.
    pub email: String,

    /// Argon2id hash of `password + salt`. Empty for SSO-provisioned
    /// accounts that have no local credential.
    #[serde(default)]
    pub password: String,

    /// Per-user random salt, generated once at creation. Empty for
    /// SSO-provisioned accounts.
    #[serde(default)]
    pub salt: String,

    /// Whether the account may log in. Disabled accounts are locked out
    /// of login and refresh.
    #[serde(default = "default_true")]
    pub status: bool,

    /// Superusers bypass all permission checks.
    #[serde(default)]
    pub is_superuser: bool,

    /// Staff may use mutating HTTP methods on guarded routes.
    #[serde(default)]
    pub is_staff: bool,

    /// When false, issuing a new token pair revokes all the user's
    /// existing sessions.
    #[serde(default)]
    pub is_multi_login: bool,

    /// RFC 3339 timestamp of the last successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// The middleware-resolved identity, cached as the snapshot document.
/// Never carries the password hash or the salt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub status: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl CurrentUser {
    pub fn from_user(user: &User, roles: Vec<Role>) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            status: user.status,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            last_login_at: user.last_login_at.clone(),
            created_at: user.created_at.clone(),
            roles,
        }
    }
}

/// Input for registering a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

/// Input for password login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Input for requesting a password reset token.
#[derive(Debug, Clone, Deserialize)]
pub struct ForgetPasswordInput {
    pub email: String,
}

/// Input for redeeming a password reset token.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordInput {
    pub email: String,
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub(crate) fn default_true() -> bool {
    true
}
