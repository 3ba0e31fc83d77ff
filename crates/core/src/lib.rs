//! Core domain for the kitchen display action history.
//!
//! Holds the undo/redo ledger, its offline pending queue, the local snapshot
//! adapter and the contract used to deliver actions to the server.

pub mod config;
pub mod errors;
pub mod history;
pub mod persistence;
pub mod sync;

pub use errors::{HistoryError, Result};
