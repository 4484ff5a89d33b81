//! Embedded SQL storage behind the `SQLStore` trait.
//!
//! Records are stored as JSON documents in a `data` column next to a few
//! indexed columns; services run plain SQL through `query`/`exec`.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
