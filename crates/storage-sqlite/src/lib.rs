//! SQLite-backed key/value storage for history snapshots.

pub mod db;
pub mod errors;
pub mod kv;
pub mod schema;

pub use errors::{Result, StorageError};
pub use kv::SqliteKeyValueStore;
