//! Storage boundary for categories, items and the movement ledger.
//!
//! Each store is a trait with an in-memory implementation for tests/dev.
//! Writes that could let an item's cached quantity drift from its ledger take
//! a [`LedgerWrite`] token, which only the inventory service can mint.

pub mod catalog;
pub mod items;
pub mod ledger;
mod table;

pub use catalog::{CatalogStore, InMemoryCatalogStore};
pub use items::{InMemoryItemStore, ItemStore};
pub use ledger::{InMemoryMovementLedger, MovementLedger};

use thiserror::Error;

/// Store operation error.
///
/// These are storage-level failures; the service maps them onto its caller
/// facing taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Optimistic version check failed.
    #[error("stale write: {0}")]
    Conflict(String),

    /// The record was rejected by the store's own checks.
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Capability to write cached quantities, delete items and touch the ledger.
///
/// Store implementations receive it as a parameter; nothing outside this crate
/// can construct one, so callers cannot bypass the service's bookkeeping.
#[derive(Debug)]
pub struct LedgerWrite {
    _sealed: (),
}

impl LedgerWrite {
    pub(crate) fn new() -> Self {
        Self { _sealed: () }
    }
}
