use serde::{Deserialize, Serialize};

/// Login outcome recorded in the audit trail: attempt was rejected.
pub const LOGIN_STATUS_FAILURE: i64 = 0;

/// Login outcome recorded in the audit trail: attempt succeeded.
pub const LOGIN_STATUS_SUCCESS: i64 = 1;

/// One row in the login audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginLog {
    pub id: String,

    /// Id of the account involved, empty when the email did not resolve.
    pub user_id: String,

    pub email: String,

    /// 1 for success, 0 for failure.
    pub status: i64,

    #[serde(default)]
    pub ip: String,

    #[serde(default)]
    pub user_agent: String,

    /// Human-readable outcome, e.g. "login success" or "incorrect password".
    pub msg: String,

    /// RFC 3339 timestamp of the attempt itself.
    pub login_time: String,

    pub created_at: String,
}

/// Payload handed to the audit sink for asynchronous persistence.
#[derive(Debug, Clone)]
pub struct CreateLoginLog {
    pub user_id: String,
    pub email: String,
    pub status: i64,
    pub ip: String,
    pub user_agent: String,
    pub msg: String,
}

/// Request metadata captured at the HTTP layer for audit rows.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}
