//! Local snapshot persistence for the history store.

mod key_value;
mod local_persistence;

pub use key_value::{KeyValueStore, MemoryKeyValueStore};
pub use local_persistence::{HistorySnapshot, LocalPersistence};
