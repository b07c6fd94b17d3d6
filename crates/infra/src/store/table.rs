use std::collections::HashMap;
use std::sync::RwLock;

use stockbook_core::Entity;

use super::StoreError;

/// In-memory table keyed by entity id.
#[derive(Debug)]
pub(crate) struct RecordTable<E: Entity> {
    label: &'static str,
    rows: RwLock<HashMap<E::Id, E>>,
}

impl<E> RecordTable<E>
where
    E: Entity + Clone,
{
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            rows: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, id: E::Id) -> Result<Option<E>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    pub(crate) fn insert(&self, row: E) -> Result<E, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        let id = row.entity_id();
        if rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("{} {id:?}", self.label)));
        }
        rows.insert(id, row.clone());
        Ok(row)
    }

    /// Replace an existing row with whatever `next` derives from it. The row
    /// is left as it was when `next` fails.
    pub(crate) fn replace_with(
        &self,
        id: E::Id,
        next: impl FnOnce(&E) -> Result<E, StoreError>,
    ) -> Result<E, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        let current = rows
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("{} {id:?}", self.label)))?;
        let updated = next(current)?;
        rows.insert(id, updated.clone());
        Ok(updated)
    }

    pub(crate) fn remove(&self, id: E::Id) -> Result<E, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        rows.remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("{} {id:?}", self.label)))
    }

    pub(crate) fn select(&self, keep: impl Fn(&E) -> bool) -> Result<Vec<E>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.values().filter(|row| keep(row)).cloned().collect())
    }
}
