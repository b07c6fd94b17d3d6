use std::sync::{Arc, RwLock};

use stockbook_inventory::{
    MovementDraft, StockItemId, StockMovement, StockMovementId, sort_newest_first,
};

use super::{LedgerWrite, StoreError};

/// Append-only movement ledger.
///
/// ## Append semantics
///
/// `append()`:
/// - rejects drafts with a non-positive quantity or a delta that disagrees
///   with the movement kind
/// - assigns the id and the next ledger sequence number (1, 2, 3, ...)
/// - never looks at the target item's quantity; the caller checks stock
///   before appending
///
/// ## Read semantics
///
/// `history()` returns an item's movements newest first, breaking timestamp
/// ties by sequence number. An item with no movements yields an empty list.
pub trait MovementLedger: Send + Sync {
    fn append(&self, draft: MovementDraft, write: &LedgerWrite) -> Result<StockMovement, StoreError>;

    fn history(&self, item_id: StockItemId) -> Result<Vec<StockMovement>, StoreError>;

    /// Remove every movement of an item (item removal cascade). Returns what
    /// was removed, oldest first.
    fn purge_item(
        &self,
        item_id: StockItemId,
        write: &LedgerWrite,
    ) -> Result<Vec<StockMovement>, StoreError>;

    /// Re-insert an already recorded movement, keeping its id and sequence
    /// (snapshot import, rollbacks).
    fn restore(&self, movement: StockMovement, write: &LedgerWrite) -> Result<(), StoreError>;

    /// Every movement in ledger (sequence) order.
    fn all(&self) -> Result<Vec<StockMovement>, StoreError>;
}

impl<S> MovementLedger for Arc<S>
where
    S: MovementLedger + ?Sized,
{
    fn append(&self, draft: MovementDraft, write: &LedgerWrite) -> Result<StockMovement, StoreError> {
        (**self).append(draft, write)
    }

    fn history(&self, item_id: StockItemId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).history(item_id)
    }

    fn purge_item(
        &self,
        item_id: StockItemId,
        write: &LedgerWrite,
    ) -> Result<Vec<StockMovement>, StoreError> {
        (**self).purge_item(item_id, write)
    }

    fn restore(&self, movement: StockMovement, write: &LedgerWrite) -> Result<(), StoreError> {
        (**self).restore(movement, write)
    }

    fn all(&self) -> Result<Vec<StockMovement>, StoreError> {
        (**self).all()
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Kept in ascending sequence order.
    entries: Vec<StockMovement>,
    last_sequence: u64,
}

/// In-memory append-only ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMovementLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryMovementLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MovementLedger for InMemoryMovementLedger {
    fn append(&self, draft: MovementDraft, _write: &LedgerWrite) -> Result<StockMovement, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let sequence = state.last_sequence + 1;
        let movement = StockMovement::record(StockMovementId::generate(), sequence, draft)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        state.last_sequence = sequence;
        state.entries.push(movement.clone());
        Ok(movement)
    }

    fn history(&self, item_id: StockItemId) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let mut movements: Vec<StockMovement> = state
            .entries
            .iter()
            .filter(|m| m.item_id() == item_id)
            .cloned()
            .collect();
        sort_newest_first(&mut movements);
        Ok(movements)
    }

    fn purge_item(
        &self,
        item_id: StockItemId,
        _write: &LedgerWrite,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        let (purged, kept): (Vec<_>, Vec<_>) = state
            .entries
            .drain(..)
            .partition(|m| m.item_id() == item_id);
        state.entries = kept;
        Ok(purged)
    }

    fn restore(&self, movement: StockMovement, _write: &LedgerWrite) -> Result<(), StoreError> {
        movement
            .validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if state.entries.iter().any(|m| m.id() == movement.id()) {
            return Err(StoreError::Duplicate(format!("movement {}", movement.id())));
        }
        let position = match state
            .entries
            .binary_search_by_key(&movement.sequence(), StockMovement::sequence)
        {
            Ok(_) => {
                return Err(StoreError::Duplicate(format!(
                    "ledger sequence {}",
                    movement.sequence()
                )));
            }
            Err(position) => position,
        };

        state.last_sequence = state.last_sequence.max(movement.sequence());
        state.entries.insert(position, movement);
        Ok(())
    }

    fn all(&self) -> Result<Vec<StockMovement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.entries.clone())
    }
}
