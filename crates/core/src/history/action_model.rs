//! Action records, their per-kind payloads and the board state they mutate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::errors::{HistoryError, Result};
use crate::sync::SyncMode;

/// Preparation status of an order item on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    InProgress,
    Ready,
    Served,
    Cancelled,
}

/// One row of the kitchen display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: ItemStatus::Pending,
            quantity,
            station: None,
            notes: None,
        }
    }
}

/// Visible client state: the items on the board and the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub items: Vec<Item>,
    pub selected_item_ids: Vec<String>,
}

impl BoardState {
    /// Replace the item with the same id in place, or append it.
    fn upsert_item(&mut self, item: &Item) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => self.items.push(item.clone()),
        }
    }

    /// Put back a deleted item at its recorded row, or append it when the
    /// row is unknown. An item already on the board is replaced in place.
    fn restore_item(&mut self, item: &Item, position: Option<usize>) {
        if self.contains(&item.id) {
            self.upsert_item(item);
            return;
        }
        match position {
            Some(index) => self.items.insert(index.min(self.items.len()), item.clone()),
            None => self.items.push(item.clone()),
        }
    }

    fn remove_item(&mut self, item_id: &str) {
        self.items.retain(|item| item.id != item_id);
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.position_of(item_id).is_some()
    }

    pub fn position_of(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    fn set_status(&mut self, item_id: &str, status: ItemStatus) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == item_id) {
            item.status = status;
        }
    }
}

fn is_blank(id: &str) -> bool {
    id.trim().is_empty()
}

/// Kind of user mutation an action records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Select,
    Delete,
    Update,
    Create,
    BatchDelete,
    StatusChange,
}

/// Client-side payload of an action, one shape per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FrontendChange {
    Select {
        previous_ids: Vec<String>,
        next_ids: Vec<String>,
    },
    Delete {
        item: Item,
        /// Board row the item occupied, filled in when the action is recorded.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
    BatchDelete {
        items: Vec<Item>,
        /// Board rows parallel to `items`.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        positions: Vec<Option<usize>>,
    },
    Update {
        before: Item,
        after: Item,
    },
    Create {
        item: Item,
    },
    StatusChange {
        item_id: String,
        from: ItemStatus,
        to: ItemStatus,
    },
}

impl FrontendChange {
    pub fn delete(item: Item) -> Self {
        Self::Delete {
            item,
            position: None,
        }
    }

    pub fn batch_delete(items: Vec<Item>) -> Self {
        Self::BatchDelete {
            items,
            positions: Vec::new(),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Select { .. } => ActionKind::Select,
            Self::Delete { .. } => ActionKind::Delete,
            Self::BatchDelete { .. } => ActionKind::BatchDelete,
            Self::Update { .. } => ActionKind::Update,
            Self::Create { .. } => ActionKind::Create,
            Self::StatusChange { .. } => ActionKind::StatusChange,
        }
    }

    /// Apply the change as recorded.
    pub fn apply_forward(&self, board: &mut BoardState) {
        match self {
            Self::Select { next_ids, .. } => board.selected_item_ids = next_ids.clone(),
            Self::Delete { item, .. } => board.remove_item(&item.id),
            Self::BatchDelete { items, .. } => {
                for item in items {
                    board.remove_item(&item.id);
                }
            }
            Self::Update { after, .. } => board.upsert_item(after),
            Self::Create { item } => board.upsert_item(item),
            Self::StatusChange { item_id, to, .. } => board.set_status(item_id, *to),
        }
    }

    /// Revert the change. Deleted items go back to their recorded rows.
    pub fn apply_inverse(&self, board: &mut BoardState) {
        match self {
            Self::Select { previous_ids, .. } => {
                board.selected_item_ids = previous_ids.clone();
            }
            Self::Delete { item, position } => board.restore_item(item, *position),
            Self::BatchDelete { items, positions } => {
                let mut known: Vec<(usize, &Item)> = Vec::new();
                let mut unknown: Vec<&Item> = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match positions.get(i).copied().flatten() {
                        Some(position) => known.push((position, item)),
                        None => unknown.push(item),
                    }
                }
                // Ascending rows, so each insert lands on its original index.
                known.sort_by_key(|(position, _)| *position);
                for (position, item) in known {
                    board.restore_item(item, Some(position));
                }
                for item in unknown {
                    board.restore_item(item, None);
                }
            }
            Self::Update { before, .. } => board.upsert_item(before),
            Self::Create { item } => board.remove_item(&item.id),
            Self::StatusChange { item_id, from, .. } => board.set_status(item_id, *from),
        }
    }

    /// Record where deleted items sit on `board` so undo can put them back.
    pub(crate) fn capture_positions(&mut self, board: &BoardState) {
        match self {
            Self::Delete { item, position } => *position = board.position_of(&item.id),
            Self::BatchDelete { items, positions } => {
                *positions = items
                    .iter()
                    .map(|item| board.position_of(&item.id))
                    .collect();
            }
            _ => {}
        }
    }

    /// Reject changes that cannot be reverted against the current board.
    pub(crate) fn check_applicable(&self, board: &BoardState) -> Result<()> {
        if let Self::Create { item } = self {
            if board.contains(&item.id) {
                return Err(HistoryError::invalid_action(format!(
                    "create targets item {} which is already on the board",
                    item.id
                )));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Select {
                previous_ids,
                next_ids,
            } => {
                if previous_ids.iter().chain(next_ids).any(|id| is_blank(id)) {
                    return Err(HistoryError::invalid_action(
                        "select change contains an empty item id",
                    ));
                }
            }
            Self::Delete { item, .. } | Self::Create { item } => {
                if is_blank(&item.id) {
                    return Err(HistoryError::invalid_action(format!(
                        "{:?} change requires an item id",
                        self.kind()
                    )));
                }
            }
            Self::BatchDelete { items, .. } => {
                if items.is_empty() {
                    return Err(HistoryError::invalid_action(
                        "batch delete requires at least one item",
                    ));
                }
                if items.iter().any(|item| is_blank(&item.id)) {
                    return Err(HistoryError::invalid_action(
                        "batch delete contains an item without id",
                    ));
                }
            }
            Self::Update { before, after } => {
                if is_blank(&after.id) {
                    return Err(HistoryError::invalid_action("update requires an item id"));
                }
                if before.id != after.id {
                    return Err(HistoryError::invalid_action(format!(
                        "update must target one item (before={}, after={})",
                        before.id, after.id
                    )));
                }
            }
            Self::StatusChange { item_id, .. } => {
                if is_blank(item_id) {
                    return Err(HistoryError::invalid_action(
                        "status change requires an item id",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Server-side operation described by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOperation {
    Insert,
    Update,
    Delete,
    None,
}

/// Minimal descriptor the server needs to replay or revert an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendChange {
    pub table: String,
    pub operation: BackendOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

fn id_filter(id: &str) -> Option<Value> {
    Some(json!({ "id": id }))
}

impl BackendChange {
    /// Descriptor that performs `change` on `table`.
    pub fn forward(table: impl Into<String>, change: &FrontendChange) -> Self {
        let table = table.into();
        match change {
            FrontendChange::Select { .. } => Self {
                table,
                operation: BackendOperation::None,
                payload: None,
                filter: None,
            },
            FrontendChange::Create { item } => Self {
                table,
                operation: BackendOperation::Insert,
                payload: Some(json!(item)),
                filter: None,
            },
            FrontendChange::Delete { item, .. } => Self {
                table,
                operation: BackendOperation::Delete,
                payload: None,
                filter: id_filter(&item.id),
            },
            FrontendChange::BatchDelete { items, .. } => Self {
                table,
                operation: BackendOperation::Delete,
                payload: None,
                filter: Some(json!({
                    "ids": items.iter().map(|item| item.id.as_str()).collect::<Vec<_>>()
                })),
            },
            FrontendChange::Update { after, .. } => Self {
                table,
                operation: BackendOperation::Update,
                payload: Some(json!(after)),
                filter: id_filter(&after.id),
            },
            FrontendChange::StatusChange { item_id, to, .. } => Self {
                table,
                operation: BackendOperation::Update,
                payload: Some(json!({ "status": to })),
                filter: id_filter(item_id),
            },
        }
    }

    /// Descriptor that reverts `change` on this descriptor's table.
    pub fn mirrored(&self, change: &FrontendChange) -> Self {
        let table = self.table.clone();
        match change {
            FrontendChange::Select { .. } => self.clone(),
            FrontendChange::Create { item } => Self {
                table,
                operation: BackendOperation::Delete,
                payload: None,
                filter: id_filter(&item.id),
            },
            FrontendChange::Delete { item, .. } => Self {
                table,
                operation: BackendOperation::Insert,
                payload: Some(json!(item)),
                filter: None,
            },
            FrontendChange::BatchDelete { items, .. } => Self {
                table,
                operation: BackendOperation::Insert,
                payload: Some(json!(items)),
                filter: None,
            },
            FrontendChange::Update { before, .. } => Self {
                table,
                operation: BackendOperation::Update,
                payload: Some(json!(before)),
                filter: id_filter(&before.id),
            },
            FrontendChange::StatusChange { item_id, from, .. } => Self {
                table,
                operation: BackendOperation::Update,
                payload: Some(json!({ "status": from })),
                filter: id_filter(item_id),
            },
        }
    }

    fn validate_for(&self, kind: ActionKind) -> Result<()> {
        let expected = match kind {
            ActionKind::Select => BackendOperation::None,
            ActionKind::Create => BackendOperation::Insert,
            ActionKind::Delete | ActionKind::BatchDelete => BackendOperation::Delete,
            ActionKind::Update | ActionKind::StatusChange => BackendOperation::Update,
        };
        if self.operation != expected {
            return Err(HistoryError::invalid_action(format!(
                "{:?} action requires backend operation {:?}, got {:?}",
                kind, expected, self.operation
            )));
        }
        if self.operation == BackendOperation::None {
            return Ok(());
        }
        if self.table.trim().is_empty() {
            return Err(HistoryError::invalid_action(
                "backend change requires a table",
            ));
        }
        let needs_payload = matches!(
            self.operation,
            BackendOperation::Insert | BackendOperation::Update
        );
        let needs_filter = matches!(
            self.operation,
            BackendOperation::Update | BackendOperation::Delete
        );
        if needs_payload && self.payload.is_none() {
            return Err(HistoryError::invalid_action(format!(
                "backend {:?} on {} requires a payload",
                self.operation, self.table
            )));
        }
        if needs_filter && self.filter.is_none() {
            return Err(HistoryError::invalid_action(format!(
                "backend {:?} on {} requires a filter",
                self.operation, self.table
            )));
        }
        Ok(())
    }
}

/// An action as submitted by a caller, before id and timestamp are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDraft {
    pub description: String,
    pub frontend_changes: FrontendChange,
    pub backend_changes: BackendChange,
}

impl ActionDraft {
    pub fn new(
        description: impl Into<String>,
        frontend_changes: FrontendChange,
        backend_changes: BackendChange,
    ) -> Self {
        Self {
            description: description.into(),
            frontend_changes,
            backend_changes,
        }
    }

    /// Draft whose backend descriptor is derived from the frontend change.
    pub fn for_table(
        table: &str,
        description: impl Into<String>,
        frontend_changes: FrontendChange,
    ) -> Self {
        let backend_changes = BackendChange::forward(table, &frontend_changes);
        Self::new(description, frontend_changes, backend_changes)
    }

    /// Reject drafts that could not be replayed or reverted.
    pub fn validate(&self) -> Result<()> {
        self.frontend_changes.validate()?;
        self.backend_changes
            .validate_for(self.frontend_changes.kind())
    }
}

/// One recorded, undoable mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub frontend_changes: FrontendChange,
    pub backend_changes: BackendChange,
    #[serde(default)]
    pub is_undo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_of_action_id: Option<String>,
    #[serde(default)]
    pub synced: bool,
}

impl Action {
    pub(crate) fn from_draft(draft: ActionDraft) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind: draft.frontend_changes.kind(),
            description: draft.description,
            created_at: Utc::now(),
            frontend_changes: draft.frontend_changes,
            backend_changes: draft.backend_changes,
            is_undo: false,
            undo_of_action_id: None,
            synced: false,
        }
    }

    /// Fresh action telling the server to revert `original`.
    pub(crate) fn undo_of(original: &Action) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind: original.kind,
            description: format!("Undo: {}", original.description),
            created_at: Utc::now(),
            frontend_changes: original.frontend_changes.clone(),
            backend_changes: original
                .backend_changes
                .mirrored(&original.frontend_changes),
            is_undo: true,
            undo_of_action_id: Some(original.id.clone()),
            synced: false,
        }
    }

    /// Fresh action replaying the forward change of `original`.
    pub(crate) fn redo_of(original: &Action) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind: original.kind,
            description: format!("Redo: {}", original.description),
            created_at: Utc::now(),
            frontend_changes: original.frontend_changes.clone(),
            backend_changes: original.backend_changes.clone(),
            is_undo: false,
            undo_of_action_id: None,
            synced: false,
        }
    }
}

/// Queue entry: an action awaiting confirmed delivery under a sync mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    pub sync_mode: SyncMode,
    #[serde(flatten)]
    pub action: Action,
}

impl PendingAction {
    pub fn new(sync_mode: SyncMode, action: Action) -> Self {
        Self { sync_mode, action }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn burger() -> Item {
        Item::new("item-1", "Burger", 2)
    }

    #[test]
    fn frontend_change_serializes_with_kind_tag() {
        let change = FrontendChange::StatusChange {
            item_id: "item-1".to_string(),
            from: ItemStatus::Pending,
            to: ItemStatus::InProgress,
        };
        let value = serde_json::to_value(&change).expect("serialize change");
        assert_eq!(
            value,
            json!({
                "type": "statusChange",
                "itemId": "item-1",
                "from": "pending",
                "to": "in_progress"
            })
        );
    }

    #[test]
    fn mirrored_status_change_restores_prior_status() {
        let change = FrontendChange::StatusChange {
            item_id: "item-1".to_string(),
            from: ItemStatus::Pending,
            to: ItemStatus::Ready,
        };
        let forward = BackendChange::forward("orders", &change);
        let mirrored = forward.mirrored(&change);

        assert_eq!(forward.payload, Some(json!({ "status": "ready" })));
        assert_eq!(mirrored.operation, BackendOperation::Update);
        assert_eq!(mirrored.payload, Some(json!({ "status": "pending" })));
        assert_eq!(mirrored.filter, Some(json!({ "id": "item-1" })));
    }

    #[test]
    fn mirrored_create_and_delete_swap_operations() {
        let create = FrontendChange::Create { item: burger() };
        let mirrored = BackendChange::forward("orders", &create).mirrored(&create);
        assert_eq!(mirrored.operation, BackendOperation::Delete);
        assert_eq!(mirrored.filter, Some(json!({ "id": "item-1" })));

        let delete = FrontendChange::delete(burger());
        let mirrored = BackendChange::forward("orders", &delete).mirrored(&delete);
        assert_eq!(mirrored.operation, BackendOperation::Insert);
        assert_eq!(mirrored.payload, Some(json!(burger())));
    }

    #[test]
    fn draft_validation_rejects_missing_backend_fields() {
        let change = FrontendChange::Update {
            before: burger(),
            after: Item {
                quantity: 3,
                ..burger()
            },
        };
        let mut draft = ActionDraft::for_table("orders", "More burgers", change);
        assert!(draft.validate().is_ok());

        draft.backend_changes.filter = None;
        let err = draft.validate().expect_err("missing filter must fail");
        assert!(err.to_string().contains("requires a filter"));

        draft.backend_changes.operation = BackendOperation::Insert;
        let err = draft.validate().expect_err("wrong operation must fail");
        assert!(err.to_string().contains("requires backend operation"));
    }

    #[test]
    fn draft_validation_rejects_update_across_items() {
        let change = FrontendChange::Update {
            before: burger(),
            after: Item::new("item-2", "Fries", 1),
        };
        let draft = ActionDraft::for_table("orders", "Swap", change);
        assert!(matches!(
            draft.validate(),
            Err(HistoryError::InvalidAction(_))
        ));
    }

    #[test]
    fn draft_validation_requires_table_for_mutations() {
        let draft = ActionDraft::for_table("  ", "Add", FrontendChange::Create { item: burger() });
        let err = draft.validate().expect_err("empty table must fail");
        assert!(err.to_string().contains("requires a table"));

        let select = ActionDraft::for_table(
            "",
            "Select",
            FrontendChange::Select {
                previous_ids: vec![],
                next_ids: vec!["item-1".to_string()],
            },
        );
        assert!(select.validate().is_ok());
    }

    #[test]
    fn undo_action_references_original() {
        let original = Action::from_draft(ActionDraft::for_table(
            "orders",
            "Add burger",
            FrontendChange::Create { item: burger() },
        ));
        let undo = Action::undo_of(&original);

        assert_ne!(undo.id, original.id);
        assert!(undo.is_undo);
        assert_eq!(undo.undo_of_action_id.as_deref(), Some(original.id.as_str()));
        assert_eq!(undo.backend_changes.operation, BackendOperation::Delete);
        assert_eq!(undo.kind, ActionKind::Create);
    }

    #[test]
    fn pending_action_flattens_action_fields() {
        let action = Action::from_draft(ActionDraft::for_table(
            "orders",
            "Add burger",
            FrontendChange::Create { item: burger() },
        ));
        let pending = PendingAction::new(SyncMode::Record, action.clone());
        let value = serde_json::to_value(&pending).expect("serialize pending");

        assert_eq!(value["syncMode"], json!("record"));
        assert_eq!(value["id"], json!(action.id));
        assert_eq!(value["kind"], json!("create"));

        let restored: PendingAction = serde_json::from_value(value).expect("deserialize pending");
        assert_eq!(restored, pending);
    }

    fn board(ids: &[&str]) -> BoardState {
        BoardState {
            items: ids.iter().map(|id| Item::new(*id, *id, 1)).collect(),
            selected_item_ids: vec![],
        }
    }

    fn board_ids(board: &BoardState) -> Vec<&str> {
        board.items.iter().map(|item| item.id.as_str()).collect()
    }

    #[test]
    fn undo_delete_restores_original_row() {
        let mut state = board(&["a", "b", "c"]);
        let mut change = FrontendChange::delete(Item::new("b", "b", 1));
        change.capture_positions(&state);
        assert_eq!(
            change,
            FrontendChange::Delete {
                item: Item::new("b", "b", 1),
                position: Some(1),
            }
        );

        change.apply_forward(&mut state);
        assert_eq!(board_ids(&state), vec!["a", "c"]);
        change.apply_inverse(&mut state);
        assert_eq!(board_ids(&state), vec!["a", "b", "c"]);
    }

    #[test]
    fn undo_batch_delete_restores_rows_in_any_item_order() {
        let mut state = board(&["a", "b", "c", "d", "e"]);
        let original = state.clone();
        let mut change = FrontendChange::batch_delete(vec![
            Item::new("d", "d", 1),
            Item::new("a", "a", 1),
            Item::new("c", "c", 1),
        ]);
        change.capture_positions(&state);

        change.apply_forward(&mut state);
        assert_eq!(board_ids(&state), vec!["b", "e"]);
        change.apply_inverse(&mut state);
        assert_eq!(state, original);
    }

    #[test]
    fn delete_without_recorded_row_appends_on_undo() {
        let mut state = board(&["a", "b"]);
        let change = FrontendChange::delete(Item::new("a", "a", 1));
        change.apply_forward(&mut state);
        change.apply_inverse(&mut state);
        assert_eq!(board_ids(&state), vec!["b", "a"]);
    }

    #[test]
    fn create_of_existing_item_is_not_applicable() {
        let state = board(&["a"]);
        let duplicate = FrontendChange::Create {
            item: Item::new("a", "Other", 2),
        };
        assert!(matches!(
            duplicate.check_applicable(&state),
            Err(HistoryError::InvalidAction(_))
        ));
        let fresh = FrontendChange::Create {
            item: Item::new("b", "b", 1),
        };
        assert!(fresh.check_applicable(&state).is_ok());
    }

    #[test]
    fn delete_position_round_trips_and_is_optional_on_the_wire() {
        let legacy: FrontendChange =
            serde_json::from_value(json!({ "type": "delete", "item": burger() }))
                .expect("deserialize delete without position");
        assert_eq!(legacy, FrontendChange::delete(burger()));

        let placed = FrontendChange::Delete {
            item: burger(),
            position: Some(4),
        };
        let value = serde_json::to_value(&placed).expect("serialize delete");
        assert_eq!(value["position"], json!(4));
    }
}
