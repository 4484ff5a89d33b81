use std::time::Duration;

use crate::service::{AuthError, AuthService};

impl AuthService {
    /// Count a login attempt for a client IP and reject once the window
    /// budget is spent. The counter key expires with the window, so the
    /// budget resets on its own.
    ///
    /// An empty IP (no proxy headers on the request) is not limited.
    pub fn check_login_rate(&self, ip: &str) -> Result<(), AuthError> {
        if ip.is_empty() {
            return Ok(());
        }

        let key = format!("{}:login:{}", self.config.limiter_prefix, ip);
        let window = Duration::from_secs(self.config.login_rate_window);

        let count = self
            .kv
            .incr(&key, window)
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        if count > self.config.login_rate_limit {
            let retry_after = match self.kv.ttl(&key) {
                Ok(Some(remaining)) => {
                    let mut secs = remaining.as_secs();
                    if remaining.subsec_nanos() > 0 {
                        secs += 1;
                    }
                    secs.max(1)
                }
                _ => self.config.login_rate_window,
            };
            return Err(AuthError::TooManyRequests {
                msg: "too many login attempts, retry later".to_string(),
                retry_after,
            });
        }

        Ok(())
    }
}
