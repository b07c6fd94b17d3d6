use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use stockbook_inventory::StockItemId;

use crate::store::StoreError;

/// Per-item mutual exclusion for the read-decide-commit sequence.
#[derive(Debug, Default)]
pub(crate) struct ItemLocks {
    inner: Mutex<HashMap<StockItemId, Arc<Mutex<()>>>>,
}

impl ItemLocks {
    /// The lock guarding `item_id`, created on first use.
    pub(crate) fn handle(&self, item_id: StockItemId) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut map = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(map.entry(item_id).or_default().clone())
    }

    /// Drop the lock of a removed item. Holders of the old handle finish
    /// normally; later callers find the item gone.
    pub(crate) fn forget(&self, item_id: StockItemId) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(&item_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or_default()
    }
}
