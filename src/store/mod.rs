//! Persistence for jobs, events, claims and tokens (libSQL).

pub mod keys;
pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
