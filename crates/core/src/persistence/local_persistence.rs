//! Snapshot adapter that keeps unsynced work across reloads.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::KeyValueStore;
use crate::errors::Result;
use crate::history::{Action, Item, PendingAction};

/// Everything needed to rebuild a history store after a reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub local_history: Vec<Action>,
    pub current_index: i64,
    pub pending_actions: Vec<PendingAction>,
    pub items: Vec<Item>,
    pub selected_item_ids: Vec<String>,
}

impl Default for HistorySnapshot {
    fn default() -> Self {
        Self {
            local_history: Vec::new(),
            current_index: -1,
            pending_actions: Vec::new(),
            items: Vec::new(),
            selected_item_ids: Vec::new(),
        }
    }
}

/// Saves and loads one JSON snapshot under a single key.
///
/// Without a backing store every operation is a no-op and `load` returns the
/// empty snapshot.
#[derive(Clone)]
pub struct LocalPersistence {
    store: Option<Arc<dyn KeyValueStore>>,
    key: String,
}

impl fmt::Debug for LocalPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalPersistence")
            .field("available", &self.store.is_some())
            .field("key", &self.key)
            .finish()
    }
}

impl LocalPersistence {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            key: key.into(),
        }
    }

    /// Persistence for contexts with no host storage.
    pub fn unavailable() -> Self {
        Self {
            store: None,
            key: String::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite the stored snapshot.
    pub fn save(&self, snapshot: &HistorySnapshot) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let json = serde_json::to_string(snapshot)?;
        store.set_item(&self.key, &json)?;
        debug!(
            "Saved history snapshot '{}' ({} actions, {} pending)",
            self.key,
            snapshot.local_history.len(),
            snapshot.pending_actions.len()
        );
        Ok(())
    }

    /// Last saved snapshot, or the empty default when absent or unreadable.
    pub fn load(&self) -> HistorySnapshot {
        let Some(store) = &self.store else {
            return HistorySnapshot::default();
        };
        match store.get_item(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<HistorySnapshot>(&raw) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(
                        "Discarding unreadable history snapshot '{}': {}",
                        self.key, err
                    );
                    HistorySnapshot::default()
                }
            },
            Ok(None) => HistorySnapshot::default(),
            Err(err) => {
                warn!("Failed to read history snapshot '{}': {}", self.key, err);
                HistorySnapshot::default()
            }
        }
    }

    pub fn clear(&self) -> Result<()> {
        match &self.store {
            Some(store) => store.remove_item(&self.key),
            None => Ok(()),
        }
    }
}
