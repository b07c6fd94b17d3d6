//! Serialized inventory state: three collections keyed by id.
//!
//! A snapshot is only accepted if it is self-consistent: every item points at
//! a category in the snapshot, every movement at an item, ledger sequence
//! numbers are unique, owners agree along each reference, and each item's
//! quantity and version equal the sum and count of its movements.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::{AggregateRoot, OwnerId};
use stockbook_inventory::{StockCategory, StockItem, StockMovement};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("snapshot integrity violation: {0}")]
    Integrity(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub categories: Vec<StockCategory>,
    pub items: Vec<StockItem>,
    /// Ledger order (ascending sequence).
    pub movements: Vec<StockMovement>,
}

impl InventorySnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.items.is_empty() && self.movements.is_empty()
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        let integrity = |msg: String| Err(SnapshotError::Integrity(msg));

        let mut category_owners = HashMap::new();
        for category in &self.categories {
            if category_owners
                .insert(category.id(), category.owner_id())
                .is_some()
            {
                return integrity(format!("duplicate category {}", category.id()));
            }
        }

        let mut ledgers: HashMap<_, ItemLedger> = HashMap::new();
        for item in &self.items {
            let ledger = ItemLedger {
                owner_id: item.owner_id(),
                balance: 0,
                movements: 0,
            };
            if ledgers.insert(item.id_typed(), ledger).is_some() {
                return integrity(format!("duplicate item {}", item.id_typed()));
            }
            match category_owners.get(&item.category_id()) {
                None => {
                    return integrity(format!(
                        "item {} references missing category {}",
                        item.id_typed(),
                        item.category_id()
                    ));
                }
                Some(owner) if *owner != item.owner_id() => {
                    return integrity(format!(
                        "item {} is owned differently from category {}",
                        item.id_typed(),
                        item.category_id()
                    ));
                }
                Some(_) => {}
            }
            if let Err(err) = item.validate() {
                return integrity(format!("item {}: {err}", item.id_typed()));
            }
        }

        let mut sequences = HashSet::new();
        let mut movement_ids = HashSet::new();
        for movement in &self.movements {
            if !movement_ids.insert(movement.id()) {
                return integrity(format!("duplicate movement {}", movement.id()));
            }
            if !sequences.insert(movement.sequence()) {
                return integrity(format!("duplicate ledger sequence {}", movement.sequence()));
            }
            if let Err(err) = movement.validate() {
                return integrity(format!("movement {}: {err}", movement.id()));
            }
            let Some(ledger) = ledgers.get_mut(&movement.item_id()) else {
                return integrity(format!(
                    "movement {} references missing item {}",
                    movement.id(),
                    movement.item_id()
                ));
            };
            if ledger.owner_id != movement.owner_id() {
                return integrity(format!(
                    "movement {} is owned differently from item {}",
                    movement.id(),
                    movement.item_id()
                ));
            }
            let Some(balance) = ledger.balance.checked_add(movement.signed_delta()) else {
                return integrity(format!(
                    "ledger balance of item {} overflows",
                    movement.item_id()
                ));
            };
            ledger.balance = balance;
            ledger.movements += 1;
        }

        for item in &self.items {
            let Some(ledger) = ledgers.get(&item.id_typed()) else {
                continue;
            };
            if ledger.balance != item.quantity() {
                return integrity(format!(
                    "item {} quantity {} does not match ledger balance {}",
                    item.id_typed(),
                    item.quantity(),
                    ledger.balance
                ));
            }
            if ledger.movements != item.version() {
                return integrity(format!(
                    "item {} version {} does not match its {} movement(s)",
                    item.id_typed(),
                    item.version(),
                    ledger.movements
                ));
            }
        }

        Ok(())
    }
}

/// Running totals for one item while walking the ledger.
struct ItemLedger {
    owner_id: OwnerId,
    balance: i64,
    movements: u64,
}
