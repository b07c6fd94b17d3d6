use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_inventory::{StockItem, StockItemId};

use crate::reference::CurrencyInfo;

/// Input for a stock-in or stock-out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub quantity: i64,
    /// Price per unit for this movement; the item's unit price when absent.
    pub price: Option<Decimal>,
    pub reason: Option<String>,
}

impl MovementRequest {
    pub fn of(quantity: i64) -> Self {
        Self {
            quantity,
            ..Self::default()
        }
    }

    pub fn at_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// An item with its derived and display values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub item: StockItem,
    /// Reference data label; `None` if the currency is no longer listed.
    pub currency: Option<CurrencyInfo>,
    pub is_low_stock: bool,
    /// On-hand quantity at the current unit price.
    pub stock_value: Decimal,
}

impl ItemSummary {
    /// Unit price with the currency symbol when one is known, e.g. `€1.50`.
    pub fn price_label(&self) -> String {
        let price = self.item.unit_price();
        match &self.currency {
            Some(info) => format!("{}{}", info.symbol, price.amount()),
            None => price.to_string(),
        }
    }
}

/// An item whose cached quantity disagrees with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiscrepancy {
    pub item_id: StockItemId,
    /// `None` when movements exist for an item that is gone.
    pub cached_quantity: Option<i64>,
    pub ledger_quantity: i64,
}
