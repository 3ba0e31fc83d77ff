//! HTTP transport delivering recorded actions to the sync endpoint.

mod client;
mod error;

pub use client::ActionSyncClient;
pub use error::{Result, SyncClientError};
