use serde::{Deserialize, Serialize};

/// Profile returned by an external identity provider after a code
/// exchange. Accounts are linked by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoProfile {
    /// Provider-side identifier for the account.
    pub external_id: String,

    pub email: String,

    #[serde(default)]
    pub firstname: String,

    #[serde(default)]
    pub lastname: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}
