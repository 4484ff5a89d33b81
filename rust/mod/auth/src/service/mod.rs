pub mod audit;
pub mod limiter;
pub mod login_log;
pub mod matcher;
pub mod policy;
pub mod role;
pub mod schema;
pub mod secure_token;
pub mod sso;
pub mod token;
pub mod user;

use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;

use boilerplate_kv::KVStore;
use boilerplate_sql::{SQLStore, Value};

use crate::model::CreateLoginLog;
use matcher::Matcher;

/// Message returned for both unknown-email and wrong-password logins so
/// responses do not reveal which accounts exist.
pub(crate) const CREDENTIAL_ERROR_MSG: &str = "incorrect email or password";

/// Message returned when a disabled account presents valid credentials.
pub(crate) const LOCKED_MSG: &str = "account is locked, contact an administrator";

/// Auth service error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("token: {0}")]
    Token(String),

    #[error("too many requests: {msg}")]
    TooManyRequests { msg: String, retry_after: u64 },

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl From<AuthError> for boilerplate_core::ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotFound(m) => boilerplate_core::ServiceError::NotFound(m),
            AuthError::Conflict(m) => boilerplate_core::ServiceError::Conflict(m),
            AuthError::Validation(m) => boilerplate_core::ServiceError::Validation(m),
            AuthError::Unauthorized(m) => boilerplate_core::ServiceError::Authorization(m),
            AuthError::Forbidden(m) => boilerplate_core::ServiceError::Forbidden(m),
            AuthError::Token(m) => boilerplate_core::ServiceError::Token(m),
            AuthError::TooManyRequests { msg, retry_after } => {
                boilerplate_core::ServiceError::TooManyRequests { msg, retry_after }
            }
            AuthError::Storage(m) | AuthError::Internal(m) => {
                boilerplate_core::ServiceError::Server(m)
            }
        }
    }
}

/// Configuration for the auth service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 24h).
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds (default: 7 days).
    pub refresh_token_ttl: i64,
    /// Identity snapshot cache TTL in seconds (default: 7 days).
    pub snapshot_ttl: u64,
    /// One-time token lifetime in seconds (default: 5 min).
    pub secure_token_ttl: u64,
    /// Cookie carrying the refresh token.
    pub cookie_name: String,
    /// Cache key prefix for access-token allow-list entries.
    pub token_prefix: String,
    /// Cache key prefix for refresh-token allow-list entries.
    pub refresh_prefix: String,
    /// Cache key prefix for identity snapshots.
    pub snapshot_prefix: String,
    /// Cache key prefix for one-time tokens.
    pub secure_token_prefix: String,
    /// Cache key prefix for rate-limiter counters.
    pub limiter_prefix: String,
    /// Login attempts allowed per window per client IP.
    pub login_rate_limit: i64,
    /// Login rate-limit window in seconds.
    pub login_rate_window: u64,
    /// Role assigned to newly registered users.
    pub default_role: String,
    /// Paths served without any identity (exact match).
    pub public_paths: Vec<String>,
    /// (method, path) pairs the permission guard allows without a
    /// matching policy rule.
    pub guard_exclude: Vec<(String, String)>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "boilerplate-dev-secret-change-me".to_string(),
            access_token_ttl: 86400,   // 24h
            refresh_token_ttl: 604800, // 7 days
            snapshot_ttl: 604800,      // 7 days
            secure_token_ttl: 300,     // 5 min
            cookie_name: "boilerplate_refresh_token".to_string(),
            token_prefix: "boilerplate:token".to_string(),
            refresh_prefix: "boilerplate:refresh_token".to_string(),
            snapshot_prefix: "boilerplate:user".to_string(),
            secure_token_prefix: "user:token".to_string(),
            limiter_prefix: "boilerplate:limiter".to_string(),
            login_rate_limit: 5,
            login_rate_window: 60,
            default_role: "user".to_string(),
            public_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/auth/token/new".to_string(),
                "/auth/logout".to_string(),
                "/auth/password/forget".to_string(),
                "/auth/password/reset".to_string(),
                "/health".to_string(),
                "/version".to_string(),
            ],
            guard_exclude: vec![
                ("POST".to_string(), "/auth/logout".to_string()),
                ("POST".to_string(), "/auth/token/new".to_string()),
                ("GET".to_string(), "/auth/me".to_string()),
            ],
        }
    }
}

/// The Auth service. Holds storage backends, configuration, and the
/// in-memory policy matcher.
pub struct AuthService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) kv: Arc<dyn KVStore>,
    pub(crate) config: AuthConfig,
    pub(crate) matcher: RwLock<Arc<Matcher>>,
    pub(crate) audit_tx: RwLock<Option<mpsc::UnboundedSender<CreateLoginLog>>>,
}

impl AuthService {
    /// Create a new AuthService, initializing the DB schema and loading
    /// policy rules into the matcher.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        config: AuthConfig,
    ) -> Result<Arc<Self>, AuthError> {
        schema::init_schema(sql.as_ref())?;
        let svc = Arc::new(Self {
            sql,
            kv,
            config,
            matcher: RwLock::new(Arc::new(Matcher::default())),
            audit_tx: RwLock::new(None),
        });
        svc.reload_matcher()?;
        Ok(svc)
    }

    /// Service configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // ── Generic CRUD helpers ──

    /// Insert a record as JSON into a table with indexed columns.
    pub(crate) fn insert_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), AuthError> {
        let json =
            serde_json::to_string(record).map_err(|e| AuthError::Internal(e.to_string()))?;

        let mut cols = vec!["id", "data"];
        let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
        let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 3;
            cols.push(col);
            placeholders.push(format!("?{}", idx));
            params.push(val.clone());
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", "),
        );

        self.sql.exec(&sql, &params).map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE constraint") {
                AuthError::Conflict(msg)
            } else {
                AuthError::Storage(msg)
            }
        })?;

        Ok(())
    }

    /// Get a record by id, deserializing the JSON `data` column.
    pub(crate) fn get_record<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, AuthError> {
        let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
        let rows = self
            .sql
            .query(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let row = rows
            .first()
            .ok_or_else(|| AuthError::NotFound(format!("{}/{}", table, id)))?;
        let data = row
            .get_str("data")
            .ok_or_else(|| AuthError::Internal("missing data column".into()))?;
        serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Update a record's JSON data and indexed columns.
    pub(crate) fn update_record<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        record: &T,
        indexes: &[(&str, Value)],
    ) -> Result<(), AuthError> {
        let json =
            serde_json::to_string(record).map_err(|e| AuthError::Internal(e.to_string()))?;

        let mut sets = vec!["data = ?1".to_string()];
        let mut params: Vec<Value> = vec![Value::Text(json)];

        for (i, (col, val)) in indexes.iter().enumerate() {
            let idx = i + 2;
            sets.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let id_idx = params.len() + 1;
        params.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE {} SET {} WHERE id = ?{}", table, sets.join(", "), id_idx,);

        let affected = self
            .sql
            .exec(&sql, &params)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if affected == 0 {
            return Err(AuthError::NotFound(format!("{}/{}", table, id)));
        }

        Ok(())
    }

    /// Delete a record by id.
    pub(crate) fn delete_record(&self, table: &str, id: &str) -> Result<(), AuthError> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", table);
        let affected = self
            .sql
            .exec(&sql, &[Value::Text(id.to_string())])
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if affected == 0 {
            return Err(AuthError::NotFound(format!("{}/{}", table, id)));
        }
        Ok(())
    }

    /// List records with optional filters and pagination.
    pub(crate) fn list_records<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, Value)],
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<T>, usize), AuthError> {
        let mut where_clauses = Vec::new();
        let mut params = Vec::new();

        for (i, (col, val)) in filters.iter().enumerate() {
            let idx = i + 1;
            where_clauses.push(format!("{} = ?{}", col, idx));
            params.push(val.clone());
        }

        let where_sql = if where_clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clauses.join(" AND "))
        };

        // Count
        let count_sql = format!("SELECT COUNT(*) as cnt FROM {}{}", table, where_sql);
        let count_rows = self
            .sql
            .query(&count_sql, &params)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let total = count_rows
            .first()
            .and_then(|r| r.get_i64("cnt"))
            .unwrap_or(0) as usize;

        // Items
        let limit_idx = params.len() + 1;
        let offset_idx = params.len() + 2;
        params.push(Value::Integer(limit as i64));
        params.push(Value::Integer(offset as i64));

        let sql = format!(
            "SELECT data FROM {}{} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            table, where_sql, limit_idx, offset_idx,
        );

        let rows = self
            .sql
            .query(&sql, &params)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let mut items = Vec::new();
        for row in &rows {
            let data = row
                .get_str("data")
                .ok_or_else(|| AuthError::Internal("missing data column".into()))?;
            let item: T =
                serde_json::from_str(data).map_err(|e| AuthError::Internal(e.to_string()))?;
            items.push(item);
        }

        Ok((items, total))
    }
}
