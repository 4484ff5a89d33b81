use serde::{Deserialize, Serialize};

/// What a secure one-time token is allowed to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    ResetPassword,
    ConfirmEmail,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::ResetPassword => "reset_password",
            TokenPurpose::ConfirmEmail => "confirm_email",
        }
    }
}

/// A short-lived single-use token stored in the cache under
/// `{prefix}:{user_id}:{purpose}`. The first successful redemption flips
/// `used`; any further redemption fails even before the TTL runs out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureToken {
    pub token: String,
    pub purpose: TokenPurpose,
    pub user_id: String,
    pub used: bool,
    /// Expiration (unix seconds), mirrored from the cache TTL.
    pub expiration: i64,
}
