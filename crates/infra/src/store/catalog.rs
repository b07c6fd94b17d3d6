use std::sync::Arc;

use stockbook_core::OwnerId;
use stockbook_inventory::{StockCategory, StockCategoryId};

use super::StoreError;
use super::table::RecordTable;

/// Category persistence.
pub trait CatalogStore: Send + Sync {
    fn create(&self, category: StockCategory) -> Result<StockCategory, StoreError>;

    /// Overwrite an existing category (`NotFound` if it does not exist).
    fn update(&self, category: StockCategory) -> Result<StockCategory, StoreError>;

    fn delete(&self, id: StockCategoryId) -> Result<StockCategory, StoreError>;

    fn get(&self, id: StockCategoryId) -> Result<Option<StockCategory>, StoreError>;

    /// Categories of one owner, ordered by name then id.
    fn list(&self, owner_id: OwnerId) -> Result<Vec<StockCategory>, StoreError>;

    /// Every category, ordered by id (snapshots).
    fn all(&self) -> Result<Vec<StockCategory>, StoreError>;
}

impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    fn create(&self, category: StockCategory) -> Result<StockCategory, StoreError> {
        (**self).create(category)
    }

    fn update(&self, category: StockCategory) -> Result<StockCategory, StoreError> {
        (**self).update(category)
    }

    fn delete(&self, id: StockCategoryId) -> Result<StockCategory, StoreError> {
        (**self).delete(id)
    }

    fn get(&self, id: StockCategoryId) -> Result<Option<StockCategory>, StoreError> {
        (**self).get(id)
    }

    fn list(&self, owner_id: OwnerId) -> Result<Vec<StockCategory>, StoreError> {
        (**self).list(owner_id)
    }

    fn all(&self) -> Result<Vec<StockCategory>, StoreError> {
        (**self).all()
    }
}

/// In-memory category store for tests/dev.
#[derive(Debug)]
pub struct InMemoryCatalogStore {
    table: RecordTable<StockCategory>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self {
            table: RecordTable::new("category"),
        }
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn create(&self, category: StockCategory) -> Result<StockCategory, StoreError> {
        self.table.insert(category)
    }

    fn update(&self, category: StockCategory) -> Result<StockCategory, StoreError> {
        self.table.replace_with(category.id(), |current| {
            if current.owner_id() != category.owner_id() {
                return Err(StoreError::Invalid("category owner cannot change".to_string()));
            }
            Ok(category.clone())
        })
    }

    fn delete(&self, id: StockCategoryId) -> Result<StockCategory, StoreError> {
        self.table.remove(id)
    }

    fn get(&self, id: StockCategoryId) -> Result<Option<StockCategory>, StoreError> {
        self.table.get(id)
    }

    fn list(&self, owner_id: OwnerId) -> Result<Vec<StockCategory>, StoreError> {
        let mut categories = self.table.select(|c| c.owner_id() == owner_id)?;
        categories.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(&b.id())));
        Ok(categories)
    }

    fn all(&self) -> Result<Vec<StockCategory>, StoreError> {
        let mut categories = self.table.select(|_| true)?;
        categories.sort_by_key(StockCategory::id);
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockbook_inventory::NewStockCategory;

    fn category(owner_id: OwnerId, name: &str) -> StockCategory {
        StockCategory::create(
            StockCategoryId::generate(),
            &NewStockCategory {
                owner_id,
                name: name.to_string(),
                description: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = InMemoryCatalogStore::new();
        let cat = store.create(category(OwnerId::new(), "Office")).unwrap();
        assert_eq!(store.get(cat.id()).unwrap(), Some(cat));
    }

    #[test]
    fn duplicate_create_is_rejected() {
        let store = InMemoryCatalogStore::new();
        let cat = category(OwnerId::new(), "Office");
        store.create(cat.clone()).unwrap();
        assert!(matches!(store.create(cat), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn update_and_delete_missing_category_is_not_found() {
        let store = InMemoryCatalogStore::new();
        let cat = category(OwnerId::new(), "Office");
        assert!(matches!(store.update(cat.clone()), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(cat.id()), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_is_owner_scoped_and_sorted_by_name() {
        let store = InMemoryCatalogStore::new();
        let owner = OwnerId::new();
        let other = OwnerId::new();
        store.create(category(owner, "Tools")).unwrap();
        store.create(category(owner, "Office")).unwrap();
        store.create(category(other, "Garden")).unwrap();

        let names: Vec<String> = store
            .list(owner)
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["Office", "Tools"]);
        assert_eq!(store.all().unwrap().len(), 3);
    }
}
