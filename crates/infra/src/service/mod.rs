//! Inventory orchestration (application-level).
//!
//! `InventoryService` is the only writer of item quantities and the movement
//! ledger. Every quantity-changing operation runs the same pipeline:
//!
//! ```text
//! Request
//!   ↓
//! 1. Take the item's lock (serializes work on one item)
//!   ↓
//! 2. Load the item and decide (pure `handle`, produces at most one movement)
//!   ↓
//! 3. Apply the movement to a copy of the item
//!   ↓
//! 4. Under the commit gate: write the cached quantity (version-checked),
//!    then append the movement; undo the quantity if the append fails
//! ```
//!
//! Readers take the commit gate shared, so they never see a quantity whose
//! movement is not yet in the ledger. Lock order is always item lock, then
//! gate; nothing acquires an item lock while holding the gate.

pub mod error;
mod locks;
mod views;

pub use error::{InventoryError, InventoryResult};
pub use views::{ItemSummary, LedgerDiscrepancy, MovementRequest};

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use stockbook_core::{Aggregate, AggregateRoot, ExpectedVersion, OwnerId};
use stockbook_inventory::{
    AdjustStock, CategoryChanges, CurrencyCode, IssueStock, ItemChanges, MovementDraft,
    NewStockCategory, NewStockItem, ReceiveStock, SeedStock, StockCategory, StockCategoryId,
    StockCommand, StockItem, StockItemId, StockMovement, ledger_balance,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{CategoryRemovalPolicy, InventoryConfig};
use crate::reference::{ReferenceData, StaticReferenceData};
use crate::snapshot::InventorySnapshot;
use crate::store::{
    CatalogStore, InMemoryCatalogStore, InMemoryItemStore, InMemoryMovementLedger, ItemStore,
    LedgerWrite, MovementLedger, StoreError,
};

use locks::ItemLocks;

/// Categories, items and the movement ledger behind one consistent API.
///
/// ## Guarantees
///
/// - An item's quantity always equals the sum of its movements' signed deltas
/// - Quantities never go negative
/// - Concurrent movements on one item never lose updates
/// - A failed operation leaves every store as it was
///
/// ## Generic Parameters
///
/// - `C`: category store
/// - `I`: item store
/// - `L`: movement ledger
pub struct InventoryService<C, I, L> {
    catalog: C,
    items: I,
    ledger: L,
    reference: Arc<dyn ReferenceData>,
    clock: Arc<dyn Clock>,
    config: InventoryConfig,
    locks: ItemLocks,
    commit_gate: RwLock<()>,
}

pub type InMemoryInventoryService =
    InventoryService<InMemoryCatalogStore, InMemoryItemStore, InMemoryMovementLedger>;

impl InMemoryInventoryService {
    /// Fresh in-memory stores with default configuration.
    pub fn in_memory() -> Self {
        Self::new(
            InMemoryCatalogStore::new(),
            InMemoryItemStore::new(),
            InMemoryMovementLedger::new(),
        )
    }
}

impl<C, I, L> InventoryService<C, I, L> {
    pub fn new(catalog: C, items: I, ledger: L) -> Self {
        Self {
            catalog,
            items,
            ledger,
            reference: Arc::new(StaticReferenceData::default()),
            clock: Arc::new(SystemClock),
            config: InventoryConfig::default(),
            locks: ItemLocks::default(),
            commit_gate: RwLock::new(()),
        }
    }

    pub fn with_reference_data(mut self, reference: impl ReferenceData + 'static) -> Self {
        self.reference = Arc::new(reference);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_config(mut self, config: InventoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }
}

impl<C, I, L> InventoryService<C, I, L>
where
    C: CatalogStore,
    I: ItemStore,
    L: MovementLedger,
{
    // ---- categories -------------------------------------------------------

    #[tracing::instrument(skip_all, fields(owner_id = %input.owner_id))]
    pub fn add_category(&self, input: NewStockCategory) -> InventoryResult<StockCategory> {
        let category = StockCategory::create(StockCategoryId::generate(), &input, self.clock.now())
            .inspect_err(|err| tracing::debug!(%err, "category rejected"))?;

        let _gate = self.write_gate()?;
        let created = self.catalog.create(category)?;
        tracing::info!(category_id = %created.id(), name = created.name(), "category added");
        Ok(created)
    }

    #[tracing::instrument(skip(self, changes))]
    pub fn edit_category(
        &self,
        category_id: StockCategoryId,
        changes: CategoryChanges,
    ) -> InventoryResult<StockCategory> {
        let _gate = self.write_gate()?;
        let current = self.require_category(category_id)?;
        let updated = current
            .with_changes(&changes, self.clock.now())
            .inspect_err(|err| tracing::debug!(%err, "category edit rejected"))?;
        let stored = self.catalog.update(updated)?;
        tracing::info!("category updated");
        Ok(stored)
    }

    /// Remove a category. With items still in it the configured
    /// [`CategoryRemovalPolicy`] decides: refuse, or take the items and their
    /// histories with it.
    #[tracing::instrument(skip(self))]
    pub fn remove_category(&self, category_id: StockCategoryId) -> InventoryResult<StockCategory> {
        let write = LedgerWrite::new();
        let _gate = self.write_gate()?;
        self.require_category(category_id)?;

        let members = self.items.list(category_id)?;
        if !members.is_empty() && self.config.category_removal == CategoryRemovalPolicy::Reject {
            tracing::debug!(items = members.len(), "category removal refused");
            return Err(InventoryError::Conflict(format!(
                "category {category_id} still holds {} item(s)",
                members.len()
            )));
        }

        let mut removed = Vec::with_capacity(members.len());
        for item in &members {
            match self.remove_item_with_history(item.id_typed(), &write) {
                Ok(entry) => removed.push(entry),
                Err(err) => {
                    self.restore_items(removed, &write);
                    return Err(err);
                }
            }
        }

        match self.catalog.delete(category_id) {
            Ok(category) => {
                for (item, _) in &removed {
                    self.locks.forget(item.id_typed());
                }
                tracing::info!(cascaded_items = removed.len(), "category removed");
                Ok(category)
            }
            Err(err) => {
                self.restore_items(removed, &write);
                Err(err.into())
            }
        }
    }

    pub fn get_category(&self, category_id: StockCategoryId) -> InventoryResult<StockCategory> {
        let _gate = self.read_gate()?;
        self.require_category(category_id)
    }

    /// The owner's categories ordered by name.
    pub fn list_categories(&self, owner_id: OwnerId) -> InventoryResult<Vec<StockCategory>> {
        let _gate = self.read_gate()?;
        Ok(self.catalog.list(owner_id)?)
    }

    // ---- items ------------------------------------------------------------

    /// Create an item. A positive opening quantity is recorded as an `in`
    /// movement so that the ledger explains it from the start.
    #[tracing::instrument(skip_all, fields(owner_id = %input.owner_id, category_id = %input.category_id))]
    pub fn add_item(&self, input: NewStockItem) -> InventoryResult<StockItem> {
        let now = self.clock.now();
        let created = StockItem::create(StockItemId::generate(), &input, now)
            .inspect_err(|err| tracing::debug!(%err, "item rejected"))?;
        self.require_currency(created.unit_price().currency())?;

        let seed = created.handle(&StockCommand::Seed(SeedStock {
            quantity: input.initial_quantity,
            reason: self.config.initial_stock_reason.clone(),
            occurred_at: now,
        }))?;
        let seed = at_most_one(seed)?;

        let write = LedgerWrite::new();
        let _gate = self.write_gate()?;
        self.require_category_reference(created.owner_id(), created.category_id())?;
        let stored = self.items.create(created)?;

        let Some(draft) = seed else {
            tracing::info!(item_id = %stored.id_typed(), "item added without opening stock");
            return Ok(stored);
        };

        let mut seeded = stored.clone();
        seeded.apply(&draft);
        match self.commit(&stored, &seeded, draft, &write) {
            Ok((item, _)) => {
                tracing::info!(item_id = %item.id_typed(), quantity = item.quantity(), "item added");
                self.note_low_stock(false, &item);
                Ok(item)
            }
            Err(err) => {
                if let Err(undo) = self.items.delete(stored.id_typed(), &write) {
                    tracing::error!(item_id = %stored.id_typed(), %undo, "failed to drop half-created item");
                }
                Err(err)
            }
        }
    }

    /// Change an item's attributes and, optionally, its quantity. A quantity
    /// change becomes one `adjustment` movement committed together with the
    /// attribute changes.
    #[tracing::instrument(skip(self, changes))]
    pub fn edit_item(&self, item_id: StockItemId, changes: ItemChanges) -> InventoryResult<StockItem> {
        let lock = self.locks.handle(item_id)?;
        let _serial = lock.lock().map_err(|_| StoreError::Poisoned)?;

        let before = self.load_locked_item(item_id)?;
        let now = self.clock.now();

        let mut after = if changes.touches_details() {
            let details = before
                .details_after(&changes)
                .inspect_err(|err| tracing::debug!(%err, "item edit rejected"))?;
            if changes.currency.is_some() {
                self.require_currency(details.unit_price.currency())?;
            }
            before.with_details(details, now)?
        } else {
            before.clone()
        };

        let adjustment = match changes.quantity {
            Some(new_quantity) => {
                let drafts = after
                    .handle(&StockCommand::Adjust(AdjustStock {
                        new_quantity,
                        reason: changes.reason.clone(),
                        occurred_at: now,
                    }))
                    .inspect_err(|err| tracing::debug!(%err, "quantity adjustment rejected"))?;
                at_most_one(drafts)?
            }
            None => None,
        };
        if let Some(draft) = &adjustment {
            after.apply(draft);
        }

        let write = LedgerWrite::new();
        let _gate = self.write_gate()?;
        if after.category_id() != before.category_id() {
            self.require_category_reference(after.owner_id(), after.category_id())?;
        }

        let stored = match adjustment {
            Some(draft) => self.commit(&before, &after, draft, &write)?.0,
            None if changes.touches_details() => {
                self.items.update_details(item_id, after.details(), now)?
            }
            None => before.clone(),
        };

        tracing::info!(quantity = stored.quantity(), version = stored.version(), "item updated");
        self.note_low_stock(before.is_low_stock(), &stored);
        Ok(stored)
    }

    /// Receive stock into an item.
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub fn record_stock_in(
        &self,
        item_id: StockItemId,
        request: MovementRequest,
    ) -> InventoryResult<StockItem> {
        self.execute(item_id, |occurred_at| {
            StockCommand::Receive(ReceiveStock {
                quantity: request.quantity,
                price: request.price,
                reason: request.reason,
                occurred_at,
            })
        })
    }

    /// Issue stock from an item. Fails with `InsufficientStock` rather than
    /// letting the quantity go negative.
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub fn record_stock_out(
        &self,
        item_id: StockItemId,
        request: MovementRequest,
    ) -> InventoryResult<StockItem> {
        self.execute(item_id, |occurred_at| {
            StockCommand::Issue(IssueStock {
                quantity: request.quantity,
                price: request.price,
                reason: request.reason,
                occurred_at,
            })
        })
    }

    /// Remove an item together with its whole movement history.
    #[tracing::instrument(skip(self))]
    pub fn remove_item(&self, item_id: StockItemId) -> InventoryResult<StockItem> {
        let lock = self.locks.handle(item_id)?;
        let _serial = lock.lock().map_err(|_| StoreError::Poisoned)?;

        let write = LedgerWrite::new();
        let removed = {
            let _gate = self.write_gate()?;
            self.remove_item_with_history(item_id, &write)
        };
        if matches!(removed, Ok(_) | Err(InventoryError::NotFound(_))) {
            self.locks.forget(item_id);
        }
        let (item, history) = removed?;
        tracing::info!(movements = history.len(), "item removed");
        Ok(item)
    }

    pub fn get_item(&self, item_id: StockItemId) -> InventoryResult<StockItem> {
        let _gate = self.read_gate()?;
        self.load_item(item_id)
    }

    /// Items of one category ordered by name.
    pub fn list_items(&self, category_id: StockCategoryId) -> InventoryResult<Vec<StockItem>> {
        let _gate = self.read_gate()?;
        self.require_category(category_id)?;
        Ok(self.items.list(category_id)?)
    }

    /// Movements of one item, newest first.
    pub fn item_history(&self, item_id: StockItemId) -> InventoryResult<Vec<StockMovement>> {
        let _gate = self.read_gate()?;
        self.load_item(item_id)?;
        Ok(self.ledger.history(item_id)?)
    }

    pub fn is_low_stock(&self, item_id: StockItemId) -> InventoryResult<bool> {
        Ok(self.get_item(item_id)?.is_low_stock())
    }

    /// The owner's items at or below their threshold, ordered by name.
    pub fn list_low_stock(&self, owner_id: OwnerId) -> InventoryResult<Vec<StockItem>> {
        let _gate = self.read_gate()?;
        let mut low = self.items.list_by_owner(owner_id)?;
        low.retain(StockItem::is_low_stock);
        Ok(low)
    }

    pub fn item_summary(&self, item_id: StockItemId) -> InventoryResult<ItemSummary> {
        let item = self.get_item(item_id)?;
        Ok(ItemSummary {
            currency: self.reference.currency(item.unit_price().currency()),
            is_low_stock: item.is_low_stock(),
            stock_value: item.stock_value(),
            item,
        })
    }

    // ---- maintenance ------------------------------------------------------

    /// Recompute every quantity from the ledger and report disagreements,
    /// including movements whose item no longer exists. Empty means healthy.
    #[tracing::instrument(skip(self))]
    pub fn verify_ledger(&self) -> InventoryResult<Vec<LedgerDiscrepancy>> {
        let _gate = self.read_gate()?;

        let mut movements: HashMap<StockItemId, Vec<StockMovement>> = HashMap::new();
        for movement in self.ledger.all()? {
            movements.entry(movement.item_id()).or_default().push(movement);
        }

        let mut found = Vec::new();
        for item in self.items.all()? {
            let history = movements.remove(&item.id_typed()).unwrap_or_default();
            let ledger_quantity = ledger_balance(&history);
            if ledger_quantity != item.quantity() {
                found.push(LedgerDiscrepancy {
                    item_id: item.id_typed(),
                    cached_quantity: Some(item.quantity()),
                    ledger_quantity,
                });
            }
        }
        for (item_id, orphaned) in movements {
            found.push(LedgerDiscrepancy {
                item_id,
                cached_quantity: None,
                ledger_quantity: ledger_balance(&orphaned),
            });
        }
        found.sort_by_key(|d| d.item_id);

        if found.is_empty() {
            tracing::debug!("ledger consistent");
        } else {
            tracing::error!(discrepancies = found.len(), "ledger and cached quantities disagree");
        }
        Ok(found)
    }

    /// A consistent copy of every store.
    pub fn export_snapshot(&self) -> InventoryResult<InventorySnapshot> {
        let _gate = self.read_gate()?;
        Ok(InventorySnapshot {
            categories: self.catalog.all()?,
            items: self.items.all()?,
            movements: self.ledger.all()?,
        })
    }

    /// Load a snapshot into empty stores. The snapshot is checked in full
    /// before anything is written.
    #[tracing::instrument(skip_all, fields(
        categories = snapshot.categories.len(),
        items = snapshot.items.len(),
        movements = snapshot.movements.len(),
    ))]
    pub fn import_snapshot(&self, snapshot: InventorySnapshot) -> InventoryResult<()> {
        snapshot.validate().map_err(|err| {
            tracing::debug!(%err, "snapshot rejected");
            InventoryError::Validation(err.to_string())
        })?;
        for item in &snapshot.items {
            self.require_currency(item.unit_price().currency())?;
        }

        let write = LedgerWrite::new();
        let _gate = self.write_gate()?;
        if !self.catalog.all()?.is_empty()
            || !self.items.all()?.is_empty()
            || !self.ledger.all()?.is_empty()
        {
            return Err(InventoryError::Conflict(
                "snapshot import requires an empty inventory".into(),
            ));
        }

        if let Err(err) = self.load_snapshot(&snapshot, &write) {
            tracing::error!(%err, "snapshot import failed; discarding partial state");
            self.discard_snapshot(&snapshot, &write);
            return Err(err.into());
        }
        tracing::info!("snapshot imported");
        Ok(())
    }

    // ---- internals --------------------------------------------------------

    fn read_gate(&self) -> InventoryResult<RwLockReadGuard<'_, ()>> {
        Ok(self.commit_gate.read().map_err(|_| StoreError::Poisoned)?)
    }

    fn write_gate(&self) -> InventoryResult<RwLockWriteGuard<'_, ()>> {
        Ok(self.commit_gate.write().map_err(|_| StoreError::Poisoned)?)
    }

    fn load_item(&self, item_id: StockItemId) -> InventoryResult<StockItem> {
        self.items
            .get(item_id)?
            .ok_or_else(|| InventoryError::NotFound(format!("item {item_id}")))
    }

    /// `load_item` for callers holding the item's lock. A missing item gets
    /// its lock entry dropped so that lookups of unknown ids leave nothing
    /// behind.
    fn load_locked_item(&self, item_id: StockItemId) -> InventoryResult<StockItem> {
        self.load_item(item_id).inspect_err(|err| {
            if matches!(err, InventoryError::NotFound(_)) {
                self.locks.forget(item_id);
            }
        })
    }

    fn require_category(&self, category_id: StockCategoryId) -> InventoryResult<StockCategory> {
        self.catalog
            .get(category_id)?
            .ok_or_else(|| InventoryError::NotFound(format!("category {category_id}")))
    }

    /// A category named by an item's input is a field value; a missing one is
    /// bad input rather than a missing target. Items live in their owner's
    /// categories only.
    fn require_category_reference(
        &self,
        owner_id: OwnerId,
        category_id: StockCategoryId,
    ) -> InventoryResult<()> {
        match self.catalog.get(category_id)? {
            Some(category) if category.owner_id() == owner_id => Ok(()),
            Some(_) => Err(InventoryError::Validation(format!(
                "category {category_id} belongs to another owner"
            ))),
            None => Err(InventoryError::Validation(format!(
                "category {category_id} does not exist"
            ))),
        }
    }

    fn require_currency(&self, code: &CurrencyCode) -> InventoryResult<()> {
        match self.reference.currency(code) {
            Some(_) => Ok(()),
            None => Err(InventoryError::Validation(format!("unknown currency {code}"))),
        }
    }

    /// Shared pipeline for stock-in and stock-out.
    fn execute(
        &self,
        item_id: StockItemId,
        command: impl FnOnce(DateTime<Utc>) -> StockCommand,
    ) -> InventoryResult<StockItem> {
        let lock = self.locks.handle(item_id)?;
        let _serial = lock.lock().map_err(|_| StoreError::Poisoned)?;

        let before = self.load_locked_item(item_id)?;
        let drafts = before
            .handle(&command(self.clock.now()))
            .inspect_err(|err| tracing::debug!(%err, "movement rejected"))?;
        let Some(draft) = at_most_one(drafts)? else {
            return Ok(before);
        };

        let mut after = before.clone();
        after.apply(&draft);

        let write = LedgerWrite::new();
        let (stored, movement) = {
            let _gate = self.write_gate()?;
            self.commit(&before, &after, draft, &write)?
        };

        tracing::info!(
            kind = %movement.kind(),
            delta = movement.signed_delta(),
            sequence = movement.sequence(),
            quantity = stored.quantity(),
            "movement recorded"
        );
        self.note_low_stock(before.is_low_stock(), &stored);
        Ok(stored)
    }

    /// Write `after` over `before`, then append the movement that explains
    /// the difference. Caller holds the item lock and the write gate.
    fn commit(
        &self,
        before: &StockItem,
        after: &StockItem,
        draft: MovementDraft,
        write: &LedgerWrite,
    ) -> InventoryResult<(StockItem, StockMovement)> {
        let stored = self
            .items
            .commit_quantity(after, ExpectedVersion::Exact(before.version()), write)?;

        match self.ledger.append(draft, write) {
            Ok(movement) => Ok((stored, movement)),
            Err(err) => {
                match self.items.commit_quantity(
                    before,
                    ExpectedVersion::Exact(stored.version()),
                    write,
                ) {
                    Ok(_) => tracing::warn!(
                        item_id = %before.id_typed(),
                        %err,
                        "ledger append failed; quantity rolled back"
                    ),
                    Err(undo) => tracing::error!(
                        item_id = %before.id_typed(),
                        %err,
                        %undo,
                        "ledger append failed and quantity rollback failed"
                    ),
                }
                Err(err.into())
            }
        }
    }

    /// Delete an item, then its history; put the item back if the ledger
    /// refuses. Caller holds the write gate.
    fn remove_item_with_history(
        &self,
        item_id: StockItemId,
        write: &LedgerWrite,
    ) -> InventoryResult<(StockItem, Vec<StockMovement>)> {
        let item = self.items.delete(item_id, write)?;
        match self.ledger.purge_item(item_id, write) {
            Ok(history) => Ok((item, history)),
            Err(err) => {
                if let Err(undo) = self.items.restore(item, write) {
                    tracing::error!(%item_id, %err, %undo, "failed to restore item after purge failure");
                }
                Err(err.into())
            }
        }
    }

    fn restore_items(&self, removed: Vec<(StockItem, Vec<StockMovement>)>, write: &LedgerWrite) {
        for (item, history) in removed.into_iter().rev() {
            let item_id = item.id_typed();
            if let Err(err) = self.items.restore(item, write) {
                tracing::error!(%item_id, %err, "failed to restore item");
                continue;
            }
            for movement in history {
                if let Err(err) = self.ledger.restore(movement, write) {
                    tracing::error!(%item_id, %err, "failed to restore movement");
                }
            }
        }
    }

    fn load_snapshot(&self, snapshot: &InventorySnapshot, write: &LedgerWrite) -> Result<(), StoreError> {
        for category in &snapshot.categories {
            self.catalog.create(category.clone())?;
        }
        for item in &snapshot.items {
            self.items.restore(item.clone(), write)?;
        }
        for movement in &snapshot.movements {
            self.ledger.restore(movement.clone(), write)?;
        }
        Ok(())
    }

    /// Best-effort removal of whatever `load_snapshot` managed to insert.
    /// Records it never reached are absent, so `NotFound` is expected here.
    fn discard_snapshot(&self, snapshot: &InventorySnapshot, write: &LedgerWrite) {
        for item in &snapshot.items {
            let item_id = item.id_typed();
            if let Err(err) = self.ledger.purge_item(item_id, write) {
                tracing::error!(%item_id, %err, "failed to discard imported movements");
            }
            match self.items.delete(item_id, write) {
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(err) => tracing::error!(%item_id, %err, "failed to discard imported item"),
            }
        }
        for category in &snapshot.categories {
            match self.catalog.delete(category.id()) {
                Ok(_) | Err(StoreError::NotFound(_)) => {}
                Err(err) => tracing::error!(
                    category_id = %category.id(),
                    %err,
                    "failed to discard imported category"
                ),
            }
        }
    }

    fn note_low_stock(&self, was_low: bool, item: &StockItem) {
        if !was_low && item.is_low_stock() {
            tracing::warn!(
                item_id = %item.id_typed(),
                quantity = item.quantity(),
                threshold = item.low_stock_threshold(),
                "item is low on stock"
            );
        }
    }
}

/// Every stock command decides at most one movement.
fn at_most_one(drafts: Vec<MovementDraft>) -> InventoryResult<Option<MovementDraft>> {
    let mut drafts = drafts.into_iter();
    match (drafts.next(), drafts.next()) {
        (first, None) => Ok(first),
        (Some(_), Some(_)) => Err(InventoryError::Conflict(
            "command produced more than one movement".into(),
        )),
        (None, Some(_)) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use stockbook_inventory::MovementKind;

    use crate::clock::FixedClock;

    /// Ledger that can be told to fail its next writes.
    #[derive(Default)]
    struct FlakyLedger {
        inner: InMemoryMovementLedger,
        fail_append: AtomicBool,
        fail_purge: AtomicBool,
        fail_restore: AtomicBool,
    }

    impl MovementLedger for FlakyLedger {
        fn append(&self, draft: MovementDraft, write: &LedgerWrite) -> Result<StockMovement, StoreError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.append(draft, write)
        }

        fn history(&self, item_id: StockItemId) -> Result<Vec<StockMovement>, StoreError> {
            self.inner.history(item_id)
        }

        fn purge_item(
            &self,
            item_id: StockItemId,
            write: &LedgerWrite,
        ) -> Result<Vec<StockMovement>, StoreError> {
            if self.fail_purge.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.purge_item(item_id, write)
        }

        fn restore(&self, movement: StockMovement, write: &LedgerWrite) -> Result<(), StoreError> {
            if self.fail_restore.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk full".into()));
            }
            self.inner.restore(movement, write)
        }

        fn all(&self) -> Result<Vec<StockMovement>, StoreError> {
            self.inner.all()
        }
    }

    type FlakyService = InventoryService<InMemoryCatalogStore, InMemoryItemStore, Arc<FlakyLedger>>;

    fn flaky() -> (FlakyService, Arc<FlakyLedger>) {
        let ledger = Arc::new(FlakyLedger::default());
        let service = InventoryService::new(
            InMemoryCatalogStore::new(),
            InMemoryItemStore::new(),
            ledger.clone(),
        );
        (service, ledger)
    }

    fn category<C: CatalogStore, I: ItemStore, L: MovementLedger>(
        service: &InventoryService<C, I, L>,
        owner_id: OwnerId,
    ) -> StockCategory {
        service
            .add_category(NewStockCategory {
                owner_id,
                name: "Beans".into(),
                description: None,
            })
            .unwrap()
    }

    fn new_item(owner_id: OwnerId, category_id: StockCategoryId, quantity: i64) -> NewStockItem {
        NewStockItem {
            owner_id,
            category_id,
            name: "Arabica 1kg".into(),
            initial_quantity: quantity,
            unit_price: Decimal::new(1250, 2),
            currency: "EUR".into(),
            low_stock_threshold: Some(5),
        }
    }

    #[test]
    fn failed_append_rolls_back_the_quantity() {
        let (service, ledger) = flaky();
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 10)).unwrap();

        ledger.fail_append.store(true, Ordering::SeqCst);
        let err = service
            .record_stock_out(item.id_typed(), MovementRequest::of(3))
            .unwrap_err();
        assert!(matches!(err, InventoryError::Storage(StoreError::Backend(_))));

        let after = service.get_item(item.id_typed()).unwrap();
        assert_eq!(after, item);
        assert_eq!(service.item_history(item.id_typed()).unwrap().len(), 1);
        assert!(service.verify_ledger().unwrap().is_empty());
    }

    #[test]
    fn failed_seed_leaves_no_item_behind() {
        let (service, ledger) = flaky();
        let owner = OwnerId::new();
        let cat = category(&service, owner);

        ledger.fail_append.store(true, Ordering::SeqCst);
        let err = service.add_item(new_item(owner, cat.id(), 10)).unwrap_err();
        assert!(matches!(err, InventoryError::Storage(_)));
        assert!(service.list_items(cat.id()).unwrap().is_empty());

        // Without opening stock nothing touches the ledger.
        assert!(service.add_item(new_item(owner, cat.id(), 0)).is_ok());
    }

    #[test]
    fn failed_adjustment_keeps_details_unchanged_too() {
        let (service, ledger) = flaky();
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 10)).unwrap();

        ledger.fail_append.store(true, Ordering::SeqCst);
        let changes = ItemChanges {
            name: Some("Robusta 1kg".into()),
            quantity: Some(4),
            ..ItemChanges::default()
        };
        assert!(service.edit_item(item.id_typed(), changes).is_err());
        assert_eq!(service.get_item(item.id_typed()).unwrap(), item);
    }

    #[test]
    fn failed_purge_keeps_item_and_history() {
        let (service, ledger) = flaky();
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 10)).unwrap();

        ledger.fail_purge.store(true, Ordering::SeqCst);
        assert!(service.remove_item(item.id_typed()).is_err());
        assert_eq!(service.get_item(item.id_typed()).unwrap(), item);
        assert_eq!(service.item_history(item.id_typed()).unwrap().len(), 1);
    }

    #[test]
    fn failed_cascade_restores_every_item() {
        let (service, ledger) = flaky();
        let service = service.with_config(
            InventoryConfig::default().with_category_removal(CategoryRemovalPolicy::Cascade),
        );
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        service.add_item(new_item(owner, cat.id(), 10)).unwrap();
        service.add_item(new_item(owner, cat.id(), 2)).unwrap();

        ledger.fail_purge.store(true, Ordering::SeqCst);
        assert!(service.remove_category(cat.id()).is_err());
        assert_eq!(service.list_items(cat.id()).unwrap().len(), 2);
        assert!(service.verify_ledger().unwrap().is_empty());
    }

    #[test]
    fn unknown_item_ids_leave_no_lock_entries() {
        let service = InMemoryInventoryService::in_memory();
        for _ in 0..250 {
            let id = StockItemId::generate();
            assert!(matches!(
                service.record_stock_in(id, MovementRequest::of(1)),
                Err(InventoryError::NotFound(_))
            ));
            assert!(matches!(
                service.record_stock_out(id, MovementRequest::of(1)),
                Err(InventoryError::NotFound(_))
            ));
            assert!(matches!(
                service.edit_item(id, ItemChanges::default()),
                Err(InventoryError::NotFound(_))
            ));
            assert!(matches!(service.remove_item(id), Err(InventoryError::NotFound(_))));
        }
        assert_eq!(service.locks.len(), 0);

        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 3)).unwrap();
        service
            .record_stock_in(item.id_typed(), MovementRequest::of(1))
            .unwrap();
        assert_eq!(service.locks.len(), 1);
        service.remove_item(item.id_typed()).unwrap();
        assert_eq!(service.locks.len(), 0);
    }

    #[test]
    fn failed_removal_keeps_the_item_lock() {
        let (service, ledger) = flaky();
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 3)).unwrap();

        ledger.fail_purge.store(true, Ordering::SeqCst);
        let held = service.locks.handle(item.id_typed()).unwrap();
        assert!(service.remove_item(item.id_typed()).is_err());
        assert!(Arc::ptr_eq(&held, &service.locks.handle(item.id_typed()).unwrap()));
    }

    #[test]
    fn items_only_join_their_owners_categories() {
        let service = InMemoryInventoryService::in_memory();
        let owner = OwnerId::new();
        let mine = category(&service, owner);
        let theirs = category(&service, OwnerId::new());

        assert!(matches!(
            service.add_item(new_item(owner, theirs.id(), 1)),
            Err(InventoryError::Validation(_))
        ));

        let item = service.add_item(new_item(owner, mine.id(), 1)).unwrap();
        let moved = ItemChanges {
            category_id: Some(theirs.id()),
            ..ItemChanges::default()
        };
        assert!(matches!(
            service.edit_item(item.id_typed(), moved),
            Err(InventoryError::Validation(_))
        ));
        assert_eq!(service.get_item(item.id_typed()).unwrap().category_id(), mine.id());
    }

    #[test]
    fn failed_import_discards_partial_state() {
        let source = InMemoryInventoryService::in_memory();
        let owner = OwnerId::new();
        let cat = category(&source, owner);
        source.add_item(new_item(owner, cat.id(), 8)).unwrap();
        let snapshot = source.export_snapshot().unwrap();

        let (target, ledger) = flaky();
        ledger.fail_restore.store(true, Ordering::SeqCst);
        assert!(matches!(
            target.import_snapshot(snapshot.clone()),
            Err(InventoryError::Storage(_))
        ));
        assert!(target.export_snapshot().unwrap().is_empty());

        ledger.fail_restore.store(false, Ordering::SeqCst);
        target.import_snapshot(snapshot.clone()).unwrap();
        assert_eq!(target.export_snapshot().unwrap(), snapshot);
    }

    #[test]
    fn movement_timestamps_come_from_the_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let service = InMemoryInventoryService::in_memory().with_clock(clock.clone());
        let owner = OwnerId::new();
        let cat = category(&service, owner);
        let item = service.add_item(new_item(owner, cat.id(), 1)).unwrap();

        clock.advance(chrono::Duration::hours(2));
        let updated = service
            .record_stock_in(item.id_typed(), MovementRequest::of(4))
            .unwrap();
        assert_eq!(updated.updated_at(), start + chrono::Duration::hours(2));

        let history = service.item_history(item.id_typed()).unwrap();
        assert_eq!(history[0].kind(), MovementKind::In);
        assert_eq!(history[0].created_at(), start + chrono::Duration::hours(2));
        assert_eq!(history[1].created_at(), start);
    }

    #[test]
    fn at_most_one_rejects_multiple_drafts() {
        let owner = OwnerId::new();
        let item = StockItem::create(
            StockItemId::generate(),
            &new_item(owner, StockCategoryId::generate(), 0),
            Utc::now(),
        )
        .unwrap();
        let mut drafts = item
            .handle(&StockCommand::Receive(ReceiveStock {
                quantity: 2,
                price: None,
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();

        assert_eq!(at_most_one(vec![]).unwrap(), None);
        assert_eq!(at_most_one(drafts.clone()).unwrap(), drafts.first().cloned());

        drafts.push(drafts[0].clone());
        assert!(matches!(at_most_one(drafts), Err(InventoryError::Conflict(_))));
    }
}
