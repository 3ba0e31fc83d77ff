//! Sync contract between the history store and the server.

mod sync_model;

pub use sync_model::*;

use async_trait::async_trait;

use crate::errors::Result;
use crate::history::Action;

/// Delivers one action message to the authoritative server.
///
/// Implementations report any non-confirmed delivery as an error; the store
/// decides whether to queue.
#[async_trait]
pub trait ActionSyncer: Send + Sync {
    async fn send(&self, mode: SyncMode, action: &Action) -> Result<SyncAck>;
}
