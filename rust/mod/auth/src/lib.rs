//! Auth module — JWT sessions, password credentials, roles + policy RBAC.
//!
//! # Resources
//!
//! - **User** — identity with salted argon2id credentials
//! - **Role** — named permission subject assigned to users
//! - **PolicyRule** — "p" permission tuple or "g" grouping tuple
//! - **SecureToken** — short-lived single-use token (password reset)
//! - **LoginLog** — audit row for every attributable login attempt
//!
//! Access and refresh tokens are JWTs backed by a cache allow-list:
//! logout, rotation, and single-session enforcement remove the cache
//! entry, which revokes the token ahead of its JWT expiry.
//!
//! # Usage
//!
//! ```ignore
//! use boilerplate_auth::{AuthModule, service::AuthConfig};
//!
//! let module = AuthModule::new(sql, kv, AuthConfig::default())?;
//! let router = module.routes(); // Already nested under /auth
//! ```

pub mod api;
pub mod model;
pub mod service;
pub mod store_impls;

use std::sync::Arc;

use axum::Router;

use boilerplate_core::Module;

use crate::service::{AuthConfig, AuthService};

/// Auth module implementing the Module trait.
///
/// Holds the AuthService and provides HTTP routes for all auth endpoints.
pub struct AuthModule {
    service: Arc<AuthService>,
}

impl AuthModule {
    /// Create a new AuthModule.
    pub fn new(
        sql: Arc<dyn boilerplate_sql::SQLStore>,
        kv: Arc<dyn boilerplate_kv::KVStore>,
        config: AuthConfig,
    ) -> Result<Self, boilerplate_core::ServiceError> {
        let service =
            AuthService::new(sql, kv, config).map_err(boilerplate_core::ServiceError::from)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying AuthService.
    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }
}

impl Module for AuthModule {
    fn name(&self) -> &str {
        "auth"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
