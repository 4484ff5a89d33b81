//! Shared types for the boilerplate server: the service error taxonomy,
//! list/pagination types, id and timestamp helpers, and the `Module` trait
//! that the daemon mounts HTTP modules through.

pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use module::Module;
pub use types::{ListParams, ListResult, new_id, now_rfc3339};
