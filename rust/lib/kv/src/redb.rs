use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Stored values carry an 8-byte little-endian header: the unix-millisecond
/// expiration time, 0 for keys that never expire.
const HEADER_LEN: usize = 8;

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database. Write transactions are serialized by redb, which makes
/// `compare_and_swap` and `incr` atomic.
pub struct RedbStore {
    db: Arc<Database>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn encode_value(value: &[u8], expires_at: u64) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_LEN + value.len());
    framed.extend_from_slice(&expires_at.to_le_bytes());
    framed.extend_from_slice(value);
    framed
}

/// Split a stored value into (expires_at, payload). None for values too
/// short to carry the header.
fn decode_value(raw: &[u8]) -> Option<(u64, &[u8])> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&raw[..HEADER_LEN]);
    Some((u64::from_le_bytes(header), &raw[HEADER_LEN..]))
}

fn is_live(expires_at: u64) -> bool {
    expires_at == 0 || expires_at > now_millis()
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(|e| KVError::Storage(e.to_string()))?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let _table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn read_live(&self, key: &str) -> Result<Option<(u64, Vec<u8>)>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        match table.get(key) {
            Ok(Some(val)) => match decode_value(val.value()) {
                Some((expires_at, payload)) if is_live(expires_at) => {
                    Ok(Some((expires_at, payload.to_vec())))
                }
                _ => Ok(None),
            },
            Ok(None) => Ok(None),
            Err(e) => Err(KVError::Storage(e.to_string())),
        }
    }

    fn write_value(&self, key: &str, value: &[u8], expires_at: u64) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            let framed = encode_value(value, expires_at);
            table
                .insert(key, framed.as_slice())
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        Ok(self.read_live(key)?.map(|(_, payload)| payload))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), KVError> {
        self.write_value(key, value, 0)
    }

    fn setex(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KVError> {
        let expires_at = now_millis() + ttl.as_millis() as u64;
        self.write_value(key, value, expires_at)
    }

    fn delete(&self, key: &str) -> Result<(), KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            table
                .remove(key)
                .map_err(|e| KVError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))
    }

    fn delete_prefix(&self, prefix: &str) -> Result<u64, KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let mut removed = 0u64;
        {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;

            // Collect first: the range iterator borrows the table.
            let matches: Vec<(String, bool)> = {
                let mut out = Vec::new();
                let range = table
                    .range(prefix..)
                    .map_err(|e| KVError::Storage(e.to_string()))?;
                for entry in range {
                    let (key, val) = entry.map_err(|e| KVError::Storage(e.to_string()))?;
                    let key_str = key.value();
                    if !key_str.starts_with(prefix) {
                        break;
                    }
                    let live = decode_value(val.value())
                        .map(|(expires_at, _)| is_live(expires_at))
                        .unwrap_or(false);
                    out.push((key_str.to_string(), live));
                }
                out
            };

            for (key, live) in &matches {
                table
                    .remove(key.as_str())
                    .map_err(|e| KVError::Storage(e.to_string()))?;
                if *live {
                    removed += 1;
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(removed)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, KVError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let table = read_txn
            .open_table(TABLE)
            .map_err(|e| KVError::Storage(e.to_string()))?;

        let mut out = Vec::new();
        let range = table
            .range(prefix..)
            .map_err(|e| KVError::Storage(e.to_string()))?;
        for entry in range {
            let (key, val) = entry.map_err(|e| KVError::Storage(e.to_string()))?;
            let key_str = key.value();
            if !key_str.starts_with(prefix) {
                break;
            }
            if let Some((expires_at, payload)) = decode_value(val.value()) {
                if is_live(expires_at) {
                    out.push((key_str.to_string(), payload.to_vec()));
                }
            }
        }
        Ok(out)
    }

    fn ttl(&self, key: &str) -> Result<Option<Duration>, KVError> {
        match self.read_live(key)? {
            Some((0, _)) => Ok(None),
            Some((expires_at, _)) => Ok(Some(Duration::from_millis(
                expires_at.saturating_sub(now_millis()),
            ))),
            None => Ok(None),
        }
    }

    fn compare_and_swap(&self, key: &str, expected: &[u8], new: &[u8]) -> Result<bool, KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let swapped = {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            let current = match table
                .get(key)
                .map_err(|e| KVError::Storage(e.to_string()))?
            {
                Some(val) => decode_value(val.value()).map(|(e, p)| (e, p.to_vec())),
                None => None,
            };
            match current {
                Some((expires_at, payload)) if is_live(expires_at) && payload == expected => {
                    let framed = encode_value(new, expires_at);
                    table
                        .insert(key, framed.as_slice())
                        .map_err(|e| KVError::Storage(e.to_string()))?;
                    true
                }
                _ => false,
            }
        };
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(swapped)
    }

    fn incr(&self, key: &str, ttl: Duration) -> Result<i64, KVError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        let value = {
            let mut table = write_txn
                .open_table(TABLE)
                .map_err(|e| KVError::Storage(e.to_string()))?;
            let current = match table
                .get(key)
                .map_err(|e| KVError::Storage(e.to_string()))?
            {
                Some(val) => decode_value(val.value()).map(|(e, p)| (e, p.to_vec())),
                None => None,
            };
            match current {
                Some((expires_at, payload)) if is_live(expires_at) => {
                    let text = std::str::from_utf8(&payload)
                        .map_err(|e| KVError::Serialization(e.to_string()))?;
                    let count: i64 = text.trim().parse().map_err(|_| {
                        KVError::Serialization(format!("counter at {key} is not an integer"))
                    })?;
                    let next = count + 1;
                    let framed = encode_value(next.to_string().as_bytes(), expires_at);
                    table
                        .insert(key, framed.as_slice())
                        .map_err(|e| KVError::Storage(e.to_string()))?;
                    next
                }
                _ => {
                    let expires_at = now_millis() + ttl.as_millis() as u64;
                    let framed = encode_value(b"1", expires_at);
                    table
                        .insert(key, framed.as_slice())
                        .map_err(|e| KVError::Storage(e.to_string()))?;
                    1
                }
            }
        };
        write_txn
            .commit()
            .map_err(|e| KVError::Storage(e.to_string()))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (RedbStore, tempfile::NamedTempFile) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let store = RedbStore::open(tmp.path()).unwrap();
        (store, tmp)
    }

    #[test]
    fn test_set_get_delete() {
        let (store, _tmp) = test_store();

        assert_eq!(store.get("k1").unwrap(), None);
        store.set("k1", b"v1").unwrap();
        assert_eq!(store.get("k1").unwrap(), Some(b"v1".to_vec()));

        store.delete("k1").unwrap();
        assert_eq!(store.get("k1").unwrap(), None);

        // Deleting a missing key is a no-op.
        store.delete("k1").unwrap();
    }

    #[test]
    fn test_setex_expires() {
        let (store, _tmp) = test_store();

        store
            .setex("short", b"gone soon", Duration::from_millis(30))
            .unwrap();
        assert_eq!(store.get("short").unwrap(), Some(b"gone soon".to_vec()));
        assert!(store.ttl("short").unwrap().is_some());

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(store.get("short").unwrap(), None);
        assert_eq!(store.ttl("short").unwrap(), None);
    }

    #[test]
    fn test_persistent_key_has_no_ttl() {
        let (store, _tmp) = test_store();

        store.set("forever", b"x").unwrap();
        assert_eq!(store.ttl("forever").unwrap(), None);
        assert_eq!(store.get("forever").unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_scan_and_delete_prefix() {
        let (store, _tmp) = test_store();

        store.set("session:alice:t1", b"1").unwrap();
        store.set("session:alice:t2", b"2").unwrap();
        store.set("session:bob:t1", b"3").unwrap();

        let alice = store.scan("session:alice:").unwrap();
        assert_eq!(alice.len(), 2);

        let removed = store.delete_prefix("session:alice:").unwrap();
        assert_eq!(removed, 2);
        assert!(store.scan("session:alice:").unwrap().is_empty());
        assert_eq!(store.scan("session:bob:").unwrap().len(), 1);
    }

    #[test]
    fn test_scan_skips_expired() {
        let (store, _tmp) = test_store();

        store.set("ns:live", b"1").unwrap();
        store
            .setex("ns:dead", b"2", Duration::from_millis(10))
            .unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let items = store.scan("ns:").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0, "ns:live");
    }

    #[test]
    fn test_compare_and_swap() {
        let (store, _tmp) = test_store();

        store.set("doc", b"old").unwrap();
        assert!(store.compare_and_swap("doc", b"old", b"new").unwrap());
        assert_eq!(store.get("doc").unwrap(), Some(b"new".to_vec()));

        // Stale expectation loses.
        assert!(!store.compare_and_swap("doc", b"old", b"other").unwrap());
        assert_eq!(store.get("doc").unwrap(), Some(b"new".to_vec()));

        // Missing key loses.
        assert!(!store.compare_and_swap("missing", b"x", b"y").unwrap());
    }

    #[test]
    fn test_compare_and_swap_preserves_ttl() {
        let (store, _tmp) = test_store();

        store
            .setex("tok", b"fresh", Duration::from_secs(60))
            .unwrap();
        assert!(store.compare_and_swap("tok", b"fresh", b"used").unwrap());

        let ttl = store.ttl("tok").unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(50));
    }

    #[test]
    fn test_incr_counts_within_window() {
        let (store, _tmp) = test_store();

        let window = Duration::from_secs(60);
        assert_eq!(store.incr("limit:1.2.3.4", window).unwrap(), 1);
        assert_eq!(store.incr("limit:1.2.3.4", window).unwrap(), 2);
        assert_eq!(store.incr("limit:1.2.3.4", window).unwrap(), 3);
    }

    #[test]
    fn test_incr_restarts_after_expiry() {
        let (store, _tmp) = test_store();

        let window = Duration::from_millis(20);
        assert_eq!(store.incr("limit:ip", window).unwrap(), 1);
        assert_eq!(store.incr("limit:ip", window).unwrap(), 2);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.incr("limit:ip", window).unwrap(), 1);
    }
}
