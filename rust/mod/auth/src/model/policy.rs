use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A permission rule: subject `v0` may perform method `v2` on paths
/// matching `v1`.
pub const PTYPE_POLICY: &str = "p";

/// A grouping rule: subject `v0` inherits the policies of subject `v1`.
pub const PTYPE_GROUP: &str = "g";

/// A stored access rule, either a "p" permission tuple or a "g"
/// subject-grouping tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Deterministic id: first 32 hex chars of sha256("ptype:v0:v1:v2"),
    /// so identical rules collapse to one row.
    pub id: String,

    /// "p" or "g".
    pub ptype: String,

    /// Subject: a role id, or a user id in "g" rules.
    pub v0: String,

    /// "p": resource path pattern (`/api/v1/users/*`, `/files/{id}`).
    /// "g": the parent subject.
    pub v1: String,

    /// "p": HTTP method, or "*" for any. Empty for "g" rules.
    #[serde(default)]
    pub v2: String,

    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl PolicyRule {
    /// Compute the deterministic rule id.
    pub fn rule_id(ptype: &str, v0: &str, v1: &str, v2: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(ptype.as_bytes());
        hasher.update(b":");
        hasher.update(v0.as_bytes());
        hasher.update(b":");
        hasher.update(v1.as_bytes());
        hasher.update(b":");
        hasher.update(v2.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hex[..32].to_string()
    }
}

/// Input for creating a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePolicyRule {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    #[serde(default)]
    pub v2: String,
}

/// Input for a dry-run permission check.
#[derive(Debug, Clone, Deserialize)]
pub struct EnforceInput {
    pub sub: String,
    pub path: String,
    pub method: String,
}
