//! Cloneable handle for reaching one history store from several tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::sync::{Mutex, MutexGuard};

use super::action_model::ActionDraft;
use super::history_store::{DrainReport, HistoryStatus, HistoryStore};
use crate::errors::Result;

/// Result of a drain request through the shared handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was in flight; this request was coalesced into it.
    AlreadyRunning,
}

/// Resets the drain flag even when the drain future is dropped mid-flight.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct SharedHistoryStore {
    inner: Arc<Mutex<HistoryStore>>,
    draining: Arc<AtomicBool>,
}

impl SharedHistoryStore {
    pub fn new(store: HistoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Exclusive access for queries or operations not wrapped here.
    pub async fn lock(&self) -> MutexGuard<'_, HistoryStore> {
        self.inner.lock().await
    }

    pub async fn record_action(&self, draft: ActionDraft) -> Result<String> {
        self.inner.lock().await.record_action(draft).await
    }

    pub async fn undo(&self) -> bool {
        self.inner.lock().await.undo().await
    }

    pub async fn redo(&self) -> bool {
        self.inner.lock().await.redo().await
    }

    pub async fn can_undo(&self) -> bool {
        self.inner.lock().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.inner.lock().await.can_redo()
    }

    pub async fn status(&self) -> HistoryStatus {
        self.inner.lock().await.status()
    }

    /// Update connectivity; an offline to online transition drains the
    /// queue through [`Self::drain_pending`].
    pub async fn set_online_status(&self, is_online: bool) -> Option<DrainOutcome> {
        let came_online = self.inner.lock().await.set_online_flag(is_online);
        if came_online {
            Some(self.drain_pending().await)
        } else {
            None
        }
    }

    /// Drain the pending queue unless a drain is already running.
    pub async fn drain_pending(&self) -> DrainOutcome {
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("Pending queue drain already in flight; coalescing request");
            return DrainOutcome::AlreadyRunning;
        }
        let _guard = DrainGuard(&self.draining);
        let report = self.inner.lock().await.drain_pending().await;
        DrainOutcome::Completed(report)
    }
}
