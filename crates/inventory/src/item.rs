use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Entity, OwnerId};

use crate::category::StockCategoryId;
use crate::money::{CurrencyCode, Money};
use crate::movement::{MovementDraft, MovementKind};
use crate::rules::required_text;

pub const ITEM_NAME_MAX: usize = 150;

/// Default reason stamped on the movement that seeds a new item.
pub const INITIAL_STOCK_REASON: &str = "initial stock";

const ADJUSTMENT_REASON: &str = "manual adjustment";

/// Stock item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(pub AggregateId);

impl StockItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn generate() -> Self {
        Self(AggregateId::new())
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: StockItem.
///
/// `quantity` is a cache of the item's ledger: it only ever changes through
/// `apply`, one movement at a time, and `version` counts those movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: StockItemId,
    owner_id: OwnerId,
    category_id: StockCategoryId,
    name: String,
    quantity: i64,
    unit_price: Money,
    low_stock_threshold: Option<i64>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockItem {
    pub owner_id: OwnerId,
    pub category_id: StockCategoryId,
    pub name: String,
    pub initial_quantity: i64,
    pub unit_price: Decimal,
    pub currency: String,
    pub low_stock_threshold: Option<i64>,
}

/// Every item field except quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub category_id: StockCategoryId,
    pub name: String,
    pub unit_price: Money,
    pub low_stock_threshold: Option<i64>,
}

/// Partial edit of an item. A quantity that differs from the stored one is
/// recorded as an adjustment movement; everything else is a plain update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub category_id: Option<StockCategoryId>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    /// `Some(None)` clears the threshold.
    pub low_stock_threshold: Option<Option<i64>>,
    pub quantity: Option<i64>,
    /// Reason recorded on the adjustment, if one is made.
    pub reason: Option<String>,
}

impl ItemChanges {
    pub fn touches_details(&self) -> bool {
        self.name.is_some()
            || self.category_id.is_some()
            || self.unit_price.is_some()
            || self.currency.is_some()
            || self.low_stock_threshold.is_some()
    }
}

/// Command: seed a freshly created item with its opening quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedStock {
    pub quantity: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: stock arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: stock leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: correct the on-hand quantity to an absolute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub new_quantity: i64,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Seed(SeedStock),
    Receive(ReceiveStock),
    Issue(IssueStock),
    Adjust(AdjustStock),
}

impl StockItem {
    /// Build a new item at quantity 0. The opening quantity is recorded
    /// separately through `StockCommand::Seed` so that it lands in the ledger.
    pub fn create(id: StockItemId, input: &NewStockItem, now: DateTime<Utc>) -> DomainResult<Self> {
        if input.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        let currency = CurrencyCode::parse(&input.currency)?;
        Ok(Self {
            id,
            owner_id: input.owner_id,
            category_id: input.category_id,
            name: required_text("item name", &input.name, ITEM_NAME_MAX)?,
            quantity: 0,
            unit_price: Money::unit_price(input.unit_price, currency)?,
            low_stock_threshold: validate_threshold(input.low_stock_threshold)?,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id_typed(&self) -> StockItemId {
        self.id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn category_id(&self) -> StockCategoryId {
        self.category_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> &Money {
        &self.unit_price
    }

    pub fn low_stock_threshold(&self) -> Option<i64> {
        self.low_stock_threshold
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Threshold set and on-hand quantity at or below it.
    pub fn is_low_stock(&self) -> bool {
        self.low_stock_threshold
            .is_some_and(|threshold| self.quantity <= threshold)
    }

    /// On-hand quantity valued at the current unit price.
    pub fn stock_value(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }

    pub fn details(&self) -> ItemDetails {
        ItemDetails {
            category_id: self.category_id,
            name: self.name.clone(),
            unit_price: self.unit_price.clone(),
            low_stock_threshold: self.low_stock_threshold,
        }
    }

    /// Merge a partial edit into the current details and validate the result.
    pub fn details_after(&self, changes: &ItemChanges) -> DomainResult<ItemDetails> {
        let mut details = self.details();
        if let Some(name) = &changes.name {
            details.name = name.clone();
        }
        if let Some(category_id) = changes.category_id {
            details.category_id = category_id;
        }
        if changes.unit_price.is_some() || changes.currency.is_some() {
            let amount = changes.unit_price.unwrap_or(self.unit_price.amount());
            let currency = match &changes.currency {
                Some(code) => CurrencyCode::parse(code)?,
                None => self.unit_price.currency().clone(),
            };
            details.unit_price = Money::unit_price(amount, currency)?;
        }
        if let Some(threshold) = changes.low_stock_threshold {
            details.low_stock_threshold = threshold;
        }
        validate_details(&details)
    }

    /// Replace every field except quantity. Quantity and version are untouched.
    pub fn with_details(&self, details: ItemDetails, now: DateTime<Utc>) -> DomainResult<Self> {
        let details = validate_details(&details)?;
        Ok(Self {
            category_id: details.category_id,
            name: details.name,
            unit_price: details.unit_price,
            low_stock_threshold: details.low_stock_threshold,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Re-check an item loaded from outside the stores (snapshots).
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity < 0 {
            return Err(DomainError::invariant("quantity cannot be negative"));
        }
        validate_details(&self.details()).map(|_| ())
    }

    fn draft(
        &self,
        kind: MovementKind,
        signed_delta: i64,
        price: Option<Decimal>,
        reason: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<MovementDraft> {
        let price = match price {
            Some(amount) => self.unit_price.with_amount(amount)?,
            None => self.unit_price.clone(),
        };
        let draft = MovementDraft {
            owner_id: self.owner_id,
            item_id: self.id,
            kind,
            quantity: signed_delta.abs(),
            signed_delta,
            price,
            reason: MovementDraft::normalize_reason(reason)?,
            occurred_at,
        };
        draft.validate()?;
        Ok(draft)
    }

    fn handle_seed(&self, cmd: &SeedStock) -> DomainResult<Vec<MovementDraft>> {
        if self.version != 0 {
            return Err(DomainError::conflict("item stock has already been seeded"));
        }
        if cmd.quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        if cmd.quantity == 0 {
            return Ok(vec![]);
        }
        Ok(vec![self.draft(
            MovementKind::In,
            cmd.quantity,
            None,
            Some(&cmd.reason),
            cmd.occurred_at,
        )?])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> DomainResult<Vec<MovementDraft>> {
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("stock-in quantity must be positive"));
        }
        if self.quantity.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::validation("stock-in would overflow quantity"));
        }
        Ok(vec![self.draft(
            MovementKind::In,
            cmd.quantity,
            cmd.price,
            cmd.reason.as_deref(),
            cmd.occurred_at,
        )?])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> DomainResult<Vec<MovementDraft>> {
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("stock-out quantity must be positive"));
        }
        if cmd.quantity > self.quantity {
            return Err(DomainError::insufficient_stock(cmd.quantity, self.quantity));
        }
        Ok(vec![self.draft(
            MovementKind::Out,
            -cmd.quantity,
            cmd.price,
            cmd.reason.as_deref(),
            cmd.occurred_at,
        )?])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> DomainResult<Vec<MovementDraft>> {
        if cmd.new_quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        let delta = cmd.new_quantity - self.quantity;
        if delta == 0 {
            return Ok(vec![]);
        }
        let reason = cmd.reason.as_deref().unwrap_or(ADJUSTMENT_REASON);
        Ok(vec![self.draft(
            MovementKind::Adjustment,
            delta,
            None,
            Some(reason),
            cmd.occurred_at,
        )?])
    }
}

fn validate_threshold(threshold: Option<i64>) -> DomainResult<Option<i64>> {
    match threshold {
        Some(t) if t < 0 => Err(DomainError::validation("low-stock threshold cannot be negative")),
        other => Ok(other),
    }
}

fn validate_details(details: &ItemDetails) -> DomainResult<ItemDetails> {
    Ok(ItemDetails {
        category_id: details.category_id,
        name: required_text("item name", &details.name, ITEM_NAME_MAX)?,
        unit_price: Money::unit_price(
            details.unit_price.amount(),
            details.unit_price.currency().clone(),
        )?,
        low_stock_threshold: validate_threshold(details.low_stock_threshold)?,
    })
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for StockItem {
    type Id = StockItemId;

    fn entity_id(&self) -> Self::Id {
        self.id
    }
}

impl Aggregate for StockItem {
    type Command = StockCommand;
    type Event = MovementDraft;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.quantity += event.signed_delta;
        self.updated_at = event.occurred_at;

        // One version per recorded movement.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Seed(cmd) => self.handle_seed(cmd),
            StockCommand::Receive(cmd) => self.handle_receive(cmd),
            StockCommand::Issue(cmd) => self.handle_issue(cmd),
            StockCommand::Adjust(cmd) => self.handle_adjust(cmd),
        }
    }
}
