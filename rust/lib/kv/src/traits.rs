use std::time::Duration;

use crate::error::KVError;

/// KVStore provides a key-value cache interface with expirations.
///
/// Keys follow a namespaced convention, e.g. `boilerplate:token:{sub}:{token}`.
/// Expired keys are reported as absent by every read path.
pub trait KVStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist
    /// or has expired.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError>;

    /// Set a key to a value without an expiration.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError>;

    /// Set a key to a value that expires after `ttl`.
    fn setex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KVError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), KVError>;

    /// Delete every key starting with `prefix`. Returns the number of
    /// live keys removed.
    fn delete_prefix(&self, prefix: &str) -> Result<u64, KVError>;

    /// List all live key/value pairs whose key starts with `prefix`.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError>;

    /// Remaining time to live for a key. None if the key is missing,
    /// expired, or has no expiration.
    fn ttl(&self, key: &str) -> Result<Option<Duration>, KVError>;

    /// Replace the value of `key` with `new` only if the current value
    /// equals `expected`. The key's remaining expiration is preserved.
    /// Returns false when the key is missing, expired, or changed.
    fn compare_and_swap(&self, key: &str, expected: &[u8], new: &[u8]) -> Result<bool, KVError>;

    /// Increment an integer counter, creating it at 1 with `ttl` when the
    /// key is missing or expired. An existing counter keeps its expiration.
    /// Returns the value after the increment.
    fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KVError>;
}
