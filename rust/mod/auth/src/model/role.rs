use serde::{Deserialize, Serialize};

use super::user::default_true;

/// Grants blanket access in the permission guard, bypassing path rules.
pub const DATA_SCOPE_ALL: i64 = 1;

/// Restricted scope, the default. Access is decided by policy rules.
pub const DATA_SCOPE_SCOPED: i64 = 2;

/// A role. Its id is the policy subject used in "p" and "g" rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier (UUIDv7, no dashes).
    pub id: String,

    /// Unique role name, e.g. "user" or "ops".
    pub name: String,

    /// Whether the role is enabled.
    #[serde(default = "default_true")]
    pub status: bool,

    /// 1 grants all data, 2 defers to policy rules.
    #[serde(default = "default_data_scope")]
    pub data_scope: i64,

    /// Free-text description.
    #[serde(default)]
    pub remark: String,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// RFC 3339 last update timestamp.
    pub updated_at: String,
}

/// Input for creating a role.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default = "default_data_scope")]
    pub data_scope: i64,
    #[serde(default)]
    pub remark: String,
}

fn default_data_scope() -> i64 {
    DATA_SCOPE_SCOPED
}
