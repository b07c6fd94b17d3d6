use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateId, DomainResult, Entity, OwnerId};

use crate::rules::{optional_text, required_text};

pub const CATEGORY_NAME_MAX: usize = 100;
pub const CATEGORY_DESCRIPTION_MAX: usize = 255;

/// Stock category identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockCategoryId(pub AggregateId);

impl StockCategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for StockCategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A named grouping of stock items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCategory {
    id: StockCategoryId,
    owner_id: OwnerId,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockCategory {
    pub owner_id: OwnerId,
    pub name: String,
    pub description: Option<String>,
}

/// Partial edit of a category. `None` leaves a field untouched; a
/// `Some(None)` description clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl StockCategory {
    pub fn create(
        id: StockCategoryId,
        input: &NewStockCategory,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            owner_id: input.owner_id,
            name: required_text("category name", &input.name, CATEGORY_NAME_MAX)?,
            description: optional_text(
                "category description",
                input.description.as_deref(),
                CATEGORY_DESCRIPTION_MAX,
            )?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the edited category; `self` is left untouched on failure.
    pub fn with_changes(&self, changes: &CategoryChanges, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.clone();
        if let Some(name) = &changes.name {
            next.name = required_text("category name", name, CATEGORY_NAME_MAX)?;
        }
        if let Some(description) = &changes.description {
            next.description = optional_text(
                "category description",
                description.as_deref(),
                CATEGORY_DESCRIPTION_MAX,
            )?;
        }
        next.updated_at = now;
        Ok(next)
    }

    pub fn id(&self) -> StockCategoryId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for StockCategory {
    type Id = StockCategoryId;

    fn entity_id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockbook_core::DomainError;

    fn input(name: &str) -> NewStockCategory {
        NewStockCategory {
            owner_id: OwnerId::new(),
            name: name.to_string(),
            description: Some("Desk supplies".to_string()),
        }
    }

    #[test]
    fn create_trims_name_and_stamps_timestamps() {
        let now = Utc::now();
        let cat = StockCategory::create(StockCategoryId::generate(), &input("  Office "), now).unwrap();
        assert_eq!(cat.name(), "Office");
        assert_eq!(cat.description(), Some("Desk supplies"));
        assert_eq!(cat.created_at(), now);
        assert_eq!(cat.updated_at(), now);
    }

    #[test]
    fn create_rejects_empty_or_overlong_name() {
        let now = Utc::now();
        let err = StockCategory::create(StockCategoryId::generate(), &input(" "), now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let long = "x".repeat(CATEGORY_NAME_MAX + 1);
        let err = StockCategory::create(StockCategoryId::generate(), &input(&long), now).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let exact = "x".repeat(CATEGORY_NAME_MAX);
        assert!(StockCategory::create(StockCategoryId::generate(), &input(&exact), now).is_ok());
    }

    #[test]
    fn create_rejects_overlong_description() {
        let mut cmd = input("Office");
        cmd.description = Some("d".repeat(CATEGORY_DESCRIPTION_MAX + 1));
        assert!(StockCategory::create(StockCategoryId::generate(), &cmd, Utc::now()).is_err());
    }

    #[test]
    fn changes_update_only_given_fields() {
        let created = Utc::now();
        let cat = StockCategory::create(StockCategoryId::generate(), &input("Office"), created).unwrap();
        let later = created + Duration::seconds(5);

        let renamed = cat
            .with_changes(
                &CategoryChanges {
                    name: Some("Stationery".to_string()),
                    description: None,
                },
                later,
            )
            .unwrap();
        assert_eq!(renamed.name(), "Stationery");
        assert_eq!(renamed.description(), Some("Desk supplies"));
        assert_eq!(renamed.created_at(), created);
        assert_eq!(renamed.updated_at(), later);

        let cleared = renamed
            .with_changes(
                &CategoryChanges {
                    name: None,
                    description: Some(None),
                },
                later,
            )
            .unwrap();
        assert_eq!(cleared.description(), None);
    }

    #[test]
    fn invalid_change_leaves_original_untouched() {
        let cat = StockCategory::create(StockCategoryId::generate(), &input("Office"), Utc::now()).unwrap();
        let before = cat.clone();
        let err = cat
            .with_changes(
                &CategoryChanges {
                    name: Some(String::new()),
                    description: None,
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(cat, before);
    }
}
