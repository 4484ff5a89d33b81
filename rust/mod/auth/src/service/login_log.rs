use boilerplate_core::{ListParams, ListResult, new_id, now_rfc3339};
use boilerplate_sql::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::model::{CreateLoginLog, LoginLog};
use crate::service::{AuthError, AuthService};

impl AuthService {
    /// Record a login attempt. Hands the entry to the audit worker when
    /// one is attached, otherwise writes inline. Never fails the login
    /// path: persistence problems are logged and swallowed.
    pub fn emit_login_log(&self, mut entry: CreateLoginLog) {
        let tx = self
            .audit_tx
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(tx) = tx {
            match tx.send(entry) {
                Ok(()) => return,
                // Worker is gone; recover the entry and write inline.
                Err(err) => entry = err.0,
            }
        }

        if let Err(e) = self.write_login_log(entry) {
            warn!("failed to record login log: {}", e);
        }
    }

    /// Persist one audit row.
    pub fn write_login_log(&self, entry: CreateLoginLog) -> Result<LoginLog, AuthError> {
        let now = now_rfc3339();
        let log = LoginLog {
            id: new_id(),
            user_id: entry.user_id,
            email: entry.email,
            status: entry.status,
            ip: entry.ip,
            user_agent: entry.user_agent,
            msg: entry.msg,
            login_time: now.clone(),
            created_at: now.clone(),
        };

        self.insert_record(
            "login_logs",
            &log.id,
            &log,
            &[
                ("user_id", Value::Text(log.user_id.clone())),
                ("status", Value::Integer(log.status)),
                ("created_at", Value::Text(now)),
            ],
        )?;

        Ok(log)
    }

    /// List audit rows, newest first.
    pub fn list_login_logs(&self, params: &ListParams) -> Result<ListResult<LoginLog>, AuthError> {
        let (items, total) =
            self.list_records("login_logs", &[], params.limit, params.offset)?;
        Ok(ListResult { items, total })
    }

    /// Create the audit channel and register its sender. Subsequent
    /// emits are queued to the returned receiver.
    pub fn attach_audit_sink(&self) -> mpsc::UnboundedReceiver<CreateLoginLog> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.audit_tx.write().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        rx
    }
}
