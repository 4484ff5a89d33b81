//! Server-side configuration.
//!
//! Reads `/etc/boilerplate/<name>.toml` (or an explicit path).

use std::path::{Path, PathBuf};

use anyhow::Context;
use boilerplate_auth::service::AuthConfig;
use serde::{Deserialize, Serialize};

/// Server configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default)]
    pub root: RootConfig,

    #[serde(default)]
    pub auth: AuthSection,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the embedded stores.
    #[serde(default)]
    pub data_dir: String,
}

/// `[jwt]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Token signing secret.
    #[serde(default)]
    pub secret: String,
}

/// `[root]` section: the seeded superadmin account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootConfig {
    #[serde(default)]
    pub email: String,

    /// Argon2id hash of the root password.
    #[serde(default)]
    pub password_hash: String,
}

/// `[auth]` section: optional overrides for the auth module defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSection {
    pub access_token_ttl: Option<i64>,
    pub refresh_token_ttl: Option<i64>,
    pub default_role: Option<String>,
    pub login_rate_limit: Option<i64>,
}

impl ServerConfig {
    /// Resolve a config argument: anything with a `/` or `.` is used as a
    /// path, a bare name maps to `/etc/boilerplate/<name>.toml`.
    pub fn resolve_path(arg: &str) -> PathBuf {
        if arg.contains('/') || arg.contains('.') {
            PathBuf::from(arg)
        } else {
            PathBuf::from(format!("/etc/boilerplate/{}.toml", arg))
        }
    }

    /// Load server configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ServerConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Fold the optional `[auth]` overrides into the module defaults.
    pub fn auth_config(&self) -> AuthConfig {
        let mut config = AuthConfig {
            jwt_secret: self.jwt.secret.clone(),
            ..Default::default()
        };
        if let Some(ttl) = self.auth.access_token_ttl {
            config.access_token_ttl = ttl;
        }
        if let Some(ttl) = self.auth.refresh_token_ttl {
            config.refresh_token_ttl = ttl;
        }
        if let Some(ref role) = self.auth.default_role {
            config.default_role = role.clone();
        }
        if let Some(limit) = self.auth.login_rate_limit {
            config.login_rate_limit = limit;
        }
        config
    }
}
