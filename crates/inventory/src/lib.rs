//! Inventory domain module (ledger-backed stock tracking).
//!
//! This crate contains business rules for stock categories, items and their
//! movement ledger, implemented purely as deterministic domain logic (no IO,
//! no locks, no storage). Stores and orchestration live in `stockbook-infra`.

pub mod category;
pub mod item;
pub mod money;
pub mod movement;
mod rules;

pub use category::{
    CATEGORY_DESCRIPTION_MAX, CATEGORY_NAME_MAX, CategoryChanges, NewStockCategory, StockCategory,
    StockCategoryId,
};
pub use item::{
    AdjustStock, INITIAL_STOCK_REASON, ITEM_NAME_MAX, IssueStock, ItemChanges, ItemDetails,
    NewStockItem, ReceiveStock, SeedStock, StockCommand, StockItem, StockItemId,
};
pub use money::{CurrencyCode, Money};
pub use movement::{
    MovementDraft, MovementKind, REASON_MAX, StockMovement, StockMovementId, ledger_balance,
    sort_newest_first,
};
