//! Action history: the undo/redo ledger and its offline queue.

mod action_model;
mod history_store;
mod retention;
mod shared_store;

pub use action_model::*;
pub use history_store::*;
pub use retention::*;
pub use shared_store::*;
