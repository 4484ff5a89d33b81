//! First-start checks and default record seeding.
//!
//! When boilerplated starts:
//! 1. Verify the config carries a root password hash. Refuse to start
//!    without one.
//! 2. Ensure the default role and the root account exist.

use std::sync::Arc;

use boilerplate_auth::model::{CreateRole, DATA_SCOPE_SCOPED};
use boilerplate_auth::service::AuthService;
use tracing::info;

use crate::config::ServerConfig;

/// Verify server configuration is ready for production use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.root.email.is_empty() {
        anyhow::bail!("root.email is empty in configuration.");
    }
    if config.root.password_hash.is_empty() {
        anyhow::bail!(
            "No root password hash found in configuration.\n\
             Set root.password_hash to an argon2id hash of the root password."
        );
    }
    if config.jwt.secret.is_empty() {
        anyhow::bail!("JWT secret is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    Ok(())
}

/// Ensure the default role and the root account exist. Creates them if
/// missing; reruns are no-ops.
pub fn seed_defaults(svc: &Arc<AuthService>, config: &ServerConfig) -> anyhow::Result<()> {
    let role_name = svc.config().default_role.clone();
    match svc.get_role_by_name(&role_name)? {
        Some(_) => info!("Default role {} already exists", role_name),
        None => {
            svc.create_role(CreateRole {
                name: role_name.clone(),
                data_scope: DATA_SCOPE_SCOPED,
                remark: "default role for new accounts".to_string(),
            })?;
            info!("Created default role {}", role_name);
        }
    }

    match svc.get_user_by_email(&config.root.email)? {
        Some(_) => info!("Root account {} already exists", config.root.email),
        None => {
            svc.create_root_user(&config.root.email, &config.root.password_hash)?;
            info!("Created root account {}", config.root.email);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JwtConfig, RootConfig, StorageConfig};

    fn valid_config() -> ServerConfig {
        ServerConfig {
            storage: StorageConfig {
                data_dir: "/tmp".to_string(),
            },
            jwt: JwtConfig {
                secret: "test".to_string(),
            },
            root: RootConfig {
                email: "root@example.com".to_string(),
                password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            },
            auth: Default::default(),
        }
    }

    #[test]
    fn test_verify_config_ok() {
        assert!(verify_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_verify_config_empty_hash() {
        let mut config = valid_config();
        config.root.password_hash = String::new();
        assert!(verify_config(&config).is_err());
    }

    #[test]
    fn test_verify_config_empty_secret() {
        let mut config = valid_config();
        config.jwt.secret = String::new();
        assert!(verify_config(&config).is_err());
    }

    #[test]
    fn test_seed_defaults_idempotent() {
        let sql = Arc::new(boilerplate_sql::SqliteStore::open_in_memory().unwrap());
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let kv = Arc::new(boilerplate_kv::RedbStore::open(tmp.path()).unwrap());
        let svc = AuthService::new(sql, kv, Default::default()).unwrap();

        let config = valid_config();
        seed_defaults(&svc, &config).unwrap();
        seed_defaults(&svc, &config).unwrap();

        assert!(svc.get_role_by_name("user").unwrap().is_some());
        let root = svc
            .get_user_by_email("root@example.com")
            .unwrap()
            .unwrap();
        assert!(root.is_superuser);
        assert!(root.is_staff);
    }
}
