//! Infrastructure layer: stores, orchestration, configuration and snapshots.

pub mod clock;
pub mod config;
pub mod reference;
pub mod service;
pub mod snapshot;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CategoryRemovalPolicy, InventoryConfig};
pub use reference::{CurrencyInfo, ReferenceData, StaticReferenceData};
pub use service::{
    InMemoryInventoryService, InventoryError, InventoryResult, InventoryService, ItemSummary,
    LedgerDiscrepancy, MovementRequest,
};
pub use snapshot::{InventorySnapshot, SnapshotError};
pub use store::{
    CatalogStore, InMemoryCatalogStore, InMemoryItemStore, InMemoryMovementLedger, ItemStore,
    LedgerWrite, MovementLedger, StoreError,
};
