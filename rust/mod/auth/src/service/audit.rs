use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::service::AuthService;

/// Start the background login audit worker.
///
/// Login and register emit their audit entries to a queue; this worker
/// drains it and persists rows off the request path. Returns a
/// CancellationToken that stops the worker when cancelled.
pub fn start(svc: Arc<AuthService>) -> CancellationToken {
    let cancel = CancellationToken::new();
    let mut rx = svc.attach_audit_sink();

    {
        let cancel = cancel.clone();

        tokio::spawn(async move {
            info!("login audit worker started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("login audit worker stopped");
                        break;
                    }
                    maybe_entry = rx.recv() => {
                        match maybe_entry {
                            Some(entry) => {
                                if let Err(e) = svc.write_login_log(entry) {
                                    error!("login audit write failed: {e}");
                                }
                            }
                            // All senders dropped; nothing left to drain.
                            None => break,
                        }
                    }
                }
            }
        });
    }

    cancel
}
