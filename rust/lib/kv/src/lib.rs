//! Embedded key-value cache behind the `KVStore` trait.
//!
//! The store speaks a small Redis-like contract: values may carry a TTL,
//! keys can be deleted by prefix, counters increment atomically, and
//! compare-and-swap updates a value only when unchanged. Backed by redb.

pub mod error;
pub mod redb;
pub mod traits;

pub use error::KVError;
pub use redb::RedbStore;
pub use traits::KVStore;
