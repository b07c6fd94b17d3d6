use std::sync::Arc;

use chrono::{DateTime, Utc};

use stockbook_core::{AggregateRoot, ExpectedVersion, OwnerId};
use stockbook_inventory::{ItemDetails, StockCategoryId, StockItem, StockItemId};

use super::table::RecordTable;
use super::{LedgerWrite, StoreError};

/// Item persistence. Owns the cached `quantity` of every item.
pub trait ItemStore: Send + Sync {
    /// Insert a brand-new item. It must carry no stock and no ledger history
    /// yet; opening stock is committed through `commit_quantity`.
    fn create(&self, item: StockItem) -> Result<StockItem, StoreError>;

    /// Update every field except quantity.
    fn update_details(
        &self,
        id: StockItemId,
        details: ItemDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError>;

    fn get(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError>;

    /// Items in one category, ordered by name then id.
    fn list(&self, category_id: StockCategoryId) -> Result<Vec<StockItem>, StoreError>;

    /// Items of one owner, ordered by name then id.
    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<StockItem>, StoreError>;

    /// Every item, ordered by id (snapshots, audits).
    fn all(&self) -> Result<Vec<StockItem>, StoreError>;

    /// Write the item as decided by the service (new quantity, version and
    /// any edited details) if the stored version still matches `expected`.
    fn commit_quantity(
        &self,
        item: &StockItem,
        expected: ExpectedVersion,
        write: &LedgerWrite,
    ) -> Result<StockItem, StoreError>;

    fn delete(&self, id: StockItemId, write: &LedgerWrite) -> Result<StockItem, StoreError>;

    /// Insert an item with existing stock (snapshot import, rollbacks).
    fn restore(&self, item: StockItem, write: &LedgerWrite) -> Result<StockItem, StoreError>;
}

impl<S> ItemStore for Arc<S>
where
    S: ItemStore + ?Sized,
{
    fn create(&self, item: StockItem) -> Result<StockItem, StoreError> {
        (**self).create(item)
    }

    fn update_details(
        &self,
        id: StockItemId,
        details: ItemDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        (**self).update_details(id, details, updated_at)
    }

    fn get(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        (**self).get(id)
    }

    fn list(&self, category_id: StockCategoryId) -> Result<Vec<StockItem>, StoreError> {
        (**self).list(category_id)
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<StockItem>, StoreError> {
        (**self).list_by_owner(owner_id)
    }

    fn all(&self) -> Result<Vec<StockItem>, StoreError> {
        (**self).all()
    }

    fn commit_quantity(
        &self,
        item: &StockItem,
        expected: ExpectedVersion,
        write: &LedgerWrite,
    ) -> Result<StockItem, StoreError> {
        (**self).commit_quantity(item, expected, write)
    }

    fn delete(&self, id: StockItemId, write: &LedgerWrite) -> Result<StockItem, StoreError> {
        (**self).delete(id, write)
    }

    fn restore(&self, item: StockItem, write: &LedgerWrite) -> Result<StockItem, StoreError> {
        (**self).restore(item, write)
    }
}

/// In-memory item store for tests/dev.
#[derive(Debug)]
pub struct InMemoryItemStore {
    table: RecordTable<StockItem>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            table: RecordTable::new("item"),
        }
    }
}

impl Default for InMemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

fn by_name(items: &mut [StockItem]) {
    items.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.id_typed().cmp(&b.id_typed()))
    });
}

impl ItemStore for InMemoryItemStore {
    fn create(&self, item: StockItem) -> Result<StockItem, StoreError> {
        if item.quantity() != 0 || item.version() != 0 {
            return Err(StoreError::Invalid(
                "new items start with no stock; opening stock goes through the ledger".to_string(),
            ));
        }
        self.table.insert(item)
    }

    fn update_details(
        &self,
        id: StockItemId,
        details: ItemDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        self.table.replace_with(id, |current| {
            current
                .with_details(details, updated_at)
                .map_err(|e| StoreError::Invalid(e.to_string()))
        })
    }

    fn get(&self, id: StockItemId) -> Result<Option<StockItem>, StoreError> {
        self.table.get(id)
    }

    fn list(&self, category_id: StockCategoryId) -> Result<Vec<StockItem>, StoreError> {
        let mut items = self.table.select(|i| i.category_id() == category_id)?;
        by_name(&mut items);
        Ok(items)
    }

    fn list_by_owner(&self, owner_id: OwnerId) -> Result<Vec<StockItem>, StoreError> {
        let mut items = self.table.select(|i| i.owner_id() == owner_id)?;
        by_name(&mut items);
        Ok(items)
    }

    fn all(&self) -> Result<Vec<StockItem>, StoreError> {
        let mut items = self.table.select(|_| true)?;
        items.sort_by_key(StockItem::id_typed);
        Ok(items)
    }

    fn commit_quantity(
        &self,
        item: &StockItem,
        expected: ExpectedVersion,
        _write: &LedgerWrite,
    ) -> Result<StockItem, StoreError> {
        if item.quantity() < 0 {
            return Err(StoreError::Invalid("quantity cannot be negative".to_string()));
        }
        self.table.replace_with(item.id_typed(), |current| {
            expected
                .check(current.version())
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            Ok(item.clone())
        })
    }

    fn delete(&self, id: StockItemId, _write: &LedgerWrite) -> Result<StockItem, StoreError> {
        self.table.remove(id)
    }

    fn restore(&self, item: StockItem, _write: &LedgerWrite) -> Result<StockItem, StoreError> {
        item.validate()
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        self.table.insert(item)
    }
}
