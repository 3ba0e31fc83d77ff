//! Undo/redo ledger with optimistic local apply and best-effort delivery.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::action_model::{Action, ActionDraft, BoardState, Item, PendingAction};
use super::retention::RetentionPolicy;
use crate::config::HistoryConfig;
use crate::errors::{HistoryError, Result};
use crate::persistence::{HistorySnapshot, LocalPersistence};
use crate::sync::{retry_delay_secs, ActionSyncer, SyncAck, SyncMode};

/// Construction options for [`HistoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOptions {
    pub retention: RetentionPolicy,
    /// Initial connectivity flag before any `set_online_status` call.
    pub start_online: bool,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            start_online: true,
        }
    }
}

impl From<&HistoryConfig> for HistoryOptions {
    fn from(config: &HistoryConfig) -> Self {
        Self {
            retention: config.retention,
            ..Self::default()
        }
    }
}

/// Delivery state of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSyncStatus {
    /// Applied locally, delivery not yet resolved.
    Pending,
    /// Waiting in the pending queue.
    Queued,
    /// Confirmed by the server.
    Synced,
}

/// Outcome of one pass over the pending queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub synced_count: usize,
    pub remaining_count: usize,
    pub last_error: Option<String>,
}

/// Advisory view of the store for sync indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub current_index: i64,
    pub history_len: usize,
    pub pending_count: usize,
    pub is_online: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    pub last_error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Suggested delay before probing connectivity again.
    pub retry_after_secs: Option<i64>,
}

/// Owns the action ledger, its cursor, the pending queue and the visible
/// board state. All mutation goes through `&mut self`.
pub struct HistoryStore {
    retention: RetentionPolicy,
    persistence: LocalPersistence,
    syncer: Arc<dyn ActionSyncer>,
    history: Vec<Action>,
    cursor: Option<usize>,
    pending: VecDeque<PendingAction>,
    board: BoardState,
    is_online: bool,
    last_error: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl HistoryStore {
    /// Create a store, restoring whatever snapshot `persistence` holds.
    pub fn new(
        options: HistoryOptions,
        persistence: LocalPersistence,
        syncer: Arc<dyn ActionSyncer>,
    ) -> Self {
        let snapshot = persistence.load();
        let mut store = Self {
            retention: options.retention,
            persistence,
            syncer,
            history: Vec::new(),
            cursor: None,
            pending: VecDeque::new(),
            board: BoardState::default(),
            is_online: options.start_online,
            last_error: None,
            last_synced_at: None,
            consecutive_failures: 0,
        };
        store.restore(snapshot);
        store
    }

    fn restore(&mut self, snapshot: HistorySnapshot) {
        let HistorySnapshot {
            local_history,
            current_index,
            pending_actions,
            items,
            selected_item_ids,
        } = snapshot;

        self.cursor = match usize::try_from(current_index) {
            Ok(_) if local_history.is_empty() => None,
            Ok(index) => Some(index.min(local_history.len() - 1)),
            Err(_) => None,
        };
        self.history = local_history;
        self.pending = pending_actions.into();
        self.board = BoardState {
            items,
            selected_item_ids,
        };

        // A record still unsynced and unqueued was in flight when the last
        // session ended.
        let in_flight: Vec<Action> = self
            .history
            .iter()
            .filter(|action| !action.synced && !self.is_queued(&action.id))
            .cloned()
            .collect();
        if !in_flight.is_empty() {
            info!(
                "Re-queueing {} unconfirmed action(s) from previous session",
                in_flight.len()
            );
            for action in in_flight {
                self.pending
                    .push_back(PendingAction::new(SyncMode::Record, action));
            }
        }

        self.enforce_retention();
        if !self.history.is_empty() || !self.pending.is_empty() {
            debug!(
                "Restored history: {} actions, cursor {}, {} pending",
                self.history.len(),
                self.current_index(),
                self.pending.len()
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ledger operations
    // ─────────────────────────────────────────────────────────────────────

    /// Record a new action, apply it locally and deliver it.
    ///
    /// Fails only when the draft violates the recording contract or cannot
    /// be reverted against the current board; delivery failures are queued.
    pub async fn record_action(&mut self, mut draft: ActionDraft) -> Result<String> {
        draft.validate()?;
        draft.frontend_changes.check_applicable(&self.board)?;
        draft.frontend_changes.capture_positions(&self.board);

        let action = Action::from_draft(draft);
        action.frontend_changes.apply_forward(&mut self.board);

        let keep = self.cursor.map_or(0, |index| index + 1);
        if keep < self.history.len() {
            debug!(
                "Discarding {} redo action(s) after new edit",
                self.history.len() - keep
            );
            self.history.truncate(keep);
        }
        self.history.push(action.clone());
        self.cursor = Some(self.history.len() - 1);
        self.enforce_retention();

        debug!(
            "Recorded {:?} action {} ({})",
            action.kind, action.id, action.description
        );
        let id = action.id.clone();
        self.dispatch(SyncMode::Record, action).await;
        Ok(id)
    }

    /// Revert the action at the cursor. Returns `false` when nothing is
    /// left to undo.
    pub async fn undo(&mut self) -> bool {
        let Some(index) = self.cursor else {
            return false;
        };
        let Some(original) = self.history.get(index).cloned() else {
            return false;
        };

        original.frontend_changes.apply_inverse(&mut self.board);
        self.cursor = index.checked_sub(1);

        debug!("Undid {:?} action {}", original.kind, original.id);
        self.dispatch(SyncMode::Undo, Action::undo_of(&original)).await;
        true
    }

    /// Reapply the action after the cursor. Returns `false` at the end of
    /// history.
    pub async fn redo(&mut self) -> bool {
        let next = self.cursor.map_or(0, |index| index + 1);
        let Some(original) = self.history.get(next).cloned() else {
            return false;
        };

        original.frontend_changes.apply_forward(&mut self.board);
        self.cursor = Some(next);

        debug!("Redid {:?} action {}", original.kind, original.id);
        self.dispatch(SyncMode::Redo, Action::redo_of(&original)).await;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.map_or(0, |index| index + 1) < self.history.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Connectivity + queue
    // ─────────────────────────────────────────────────────────────────────

    /// Update the connectivity flag; coming back online drains the queue.
    pub async fn set_online_status(&mut self, is_online: bool) -> Option<DrainReport> {
        if self.set_online_flag(is_online) {
            Some(self.drain_pending().await)
        } else {
            None
        }
    }

    /// Update the connectivity flag without draining. Returns `true` on an
    /// offline to online transition.
    pub fn set_online_flag(&mut self, is_online: bool) -> bool {
        let was_online = self.is_online;
        self.is_online = is_online;
        if was_online != is_online {
            info!(
                "History store is now {}",
                if is_online { "online" } else { "offline" }
            );
        }
        is_online && !was_online
    }

    /// Deliver queued actions in submission order, stopping at the first
    /// failure.
    pub async fn drain_pending(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.is_online {
            report.remaining_count = self.pending.len();
            return report;
        }

        while let Some(entry) = self.pending.front() {
            let mode = entry.sync_mode;
            match self.syncer.send(mode, &entry.action).await {
                Ok(ack) => {
                    if let Some(entry) = self.pending.pop_front() {
                        self.mark_delivered(entry.sync_mode, &entry.action.id, &ack);
                    }
                    report.synced_count += 1;
                    self.persist();
                }
                Err(err) => {
                    report.last_error = Some(err.to_string());
                    self.record_failure(mode, &err);
                    break;
                }
            }
        }

        report.remaining_count = self.pending.len();
        if report.remaining_count > 0 || report.synced_count > 1 {
            info!(
                "Drained pending queue: {} synced, {} remaining",
                report.synced_count, report.remaining_count
            );
        }
        report
    }

    /// Queue the message and persist before any network I/O, so a dropped
    /// send future leaves it in the snapshot. Online, the queue is drained
    /// from the head, which keeps older entries ahead of this one.
    async fn dispatch(&mut self, mode: SyncMode, action: Action) {
        debug!("Queued {} message for action {}", mode, action.id);
        self.pending.push_back(PendingAction::new(mode, action));
        self.persist();

        if self.is_online {
            self.drain_pending().await;
        }
    }

    fn mark_delivered(&mut self, mode: SyncMode, action_id: &str, ack: &SyncAck) {
        if mode == SyncMode::Record {
            if let Some(action) = self.history.iter_mut().find(|a| a.id == action_id) {
                action.synced = true;
            }
        }
        debug!(
            "Server confirmed {} message for action {}: {}",
            mode, action_id, ack.message
        );
        self.last_synced_at = Some(Utc::now());
        self.last_error = None;
        self.consecutive_failures = 0;
    }

    fn record_failure(&mut self, mode: SyncMode, err: &HistoryError) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err.to_string());
        warn!(
            "Sync of {} message failed; keeping it queued ({} consecutive failure(s)): {}",
            mode, self.consecutive_failures, err
        );
    }

    fn is_queued(&self, action_id: &str) -> bool {
        self.pending.iter().any(|entry| entry.action.id == action_id)
    }

    fn enforce_retention(&mut self) {
        let Some(limit) = self.retention.limit() else {
            return;
        };
        while self.history.len() > limit {
            let evicted = self.history.remove(0);
            if !evicted.synced && !self.is_queued(&evicted.id) {
                warn!(
                    "Evicting unsynced action {}; moving it to the pending queue",
                    evicted.id
                );
                self.pending
                    .push_back(PendingAction::new(SyncMode::Record, evicted));
            }
            self.cursor = self.cursor.and_then(|index| index.checked_sub(1));
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Visible state + housekeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the board contents with a fresh server load without
    /// recording an action. Selection of vanished items is dropped.
    pub fn set_items(&mut self, items: Vec<Item>) {
        self.board
            .selected_item_ids
            .retain(|id| items.iter().any(|item| &item.id == id));
        self.board.items = items;
        self.persist();
    }

    /// Forget history, queue and board state, and remove the snapshot.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                "Clearing history with {} undelivered message(s)",
                self.pending.len()
            );
        }
        self.history.clear();
        self.cursor = None;
        self.pending.clear();
        self.board = BoardState::default();
        self.last_error = None;
        self.consecutive_failures = 0;
        if let Err(err) = self.persistence.clear() {
            warn!("Failed to clear history snapshot: {}", err);
        }
    }

    fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            local_history: self.history.clone(),
            current_index: self.current_index(),
            pending_actions: self.pending.iter().cloned().collect(),
            items: self.board.items.clone(),
            selected_item_ids: self.board.selected_item_ids.clone(),
        }
    }

    fn persist(&self) {
        if let Err(err) = self.persistence.save(&self.snapshot()) {
            warn!("Failed to persist history snapshot: {}", err);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// Index of the last applied action, -1 when none.
    pub fn current_index(&self) -> i64 {
        self.cursor
            .and_then(|index| i64::try_from(index).ok())
            .unwrap_or(-1)
    }

    pub fn current_action(&self) -> Option<&Action> {
        self.cursor.and_then(|index| self.history.get(index))
    }

    pub fn pending_actions(&self) -> impl Iterator<Item = &PendingAction> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn items(&self) -> &[Item] {
        &self.board.items
    }

    pub fn selected_item_ids(&self) -> &[String] {
        &self.board.selected_item_ids
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    pub fn action_sync_status(&self, action_id: &str) -> Option<ActionSyncStatus> {
        if self.is_queued(action_id) {
            return Some(ActionSyncStatus::Queued);
        }
        self.history
            .iter()
            .find(|action| action.id == action_id)
            .map(|action| {
                if action.synced {
                    ActionSyncStatus::Synced
                } else {
                    ActionSyncStatus::Pending
                }
            })
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            current_index: self.current_index(),
            history_len: self.history.len(),
            pending_count: self.pending.len(),
            is_online: self.is_online,
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            last_error: self.last_error.clone(),
            last_synced_at: self.last_synced_at,
            consecutive_failures: self.consecutive_failures,
            retry_after_secs: retry_delay_secs(self.consecutive_failures),
        }
    }
}
