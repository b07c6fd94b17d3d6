//! Ledger entries: immutable, append-only stock movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, Entity, OwnerId, RecordId};

use crate::item::StockItemId;
use crate::money::Money;
use crate::rules::optional_text;

pub const REASON_MAX: usize = 255;

/// Ledger entry identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockMovementId(pub RecordId);

impl StockMovementId {
    pub fn generate() -> Self {
        Self(RecordId::new())
    }
}

impl core::fmt::Display for StockMovementId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    In,
    Out,
    Adjustment,
}

impl MovementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "in",
            MovementKind::Out => "out",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decided but not yet recorded movement.
///
/// Produced by `StockItem::handle`, applied to the item with
/// `StockItem::apply`, then handed to the ledger which assigns id and
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub owner_id: OwnerId,
    pub item_id: StockItemId,
    pub kind: MovementKind,
    /// Magnitude, always positive.
    pub quantity: i64,
    /// Effect on the item's quantity.
    pub signed_delta: i64,
    pub price: Money,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementDraft {
    /// Check the draft is internally consistent (positive magnitude, delta
    /// matching kind and magnitude, bounded reason).
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("movement quantity must be positive"));
        }
        let consistent = match self.kind {
            MovementKind::In => self.signed_delta == self.quantity,
            MovementKind::Out => self.signed_delta == -self.quantity,
            MovementKind::Adjustment => self.signed_delta.unsigned_abs() == self.quantity as u64,
        };
        if !consistent {
            return Err(DomainError::validation(format!(
                "signed delta {} does not match {} movement of {}",
                self.signed_delta, self.kind, self.quantity
            )));
        }
        if self.price.amount().is_sign_negative() && !self.price.amount().is_zero() {
            return Err(DomainError::validation("movement price cannot be negative"));
        }
        if let Some(reason) = &self.reason {
            if reason.chars().count() > REASON_MAX {
                return Err(DomainError::validation(format!(
                    "reason cannot exceed {REASON_MAX} characters"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn normalize_reason(reason: Option<&str>) -> DomainResult<Option<String>> {
        optional_text("reason", reason, REASON_MAX)
    }
}

/// A recorded ledger entry. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: StockMovementId,
    /// Ledger insertion order; breaks timestamp ties.
    sequence: u64,
    owner_id: OwnerId,
    item_id: StockItemId,
    kind: MovementKind,
    quantity: i64,
    signed_delta: i64,
    price: Money,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    pub fn record(id: StockMovementId, sequence: u64, draft: MovementDraft) -> DomainResult<Self> {
        draft.validate()?;
        if sequence == 0 {
            return Err(DomainError::invariant("ledger sequence starts at 1"));
        }
        Ok(Self {
            id,
            sequence,
            owner_id: draft.owner_id,
            item_id: draft.item_id,
            kind: draft.kind,
            quantity: draft.quantity,
            signed_delta: draft.signed_delta,
            price: draft.price,
            reason: draft.reason,
            created_at: draft.occurred_at,
        })
    }

    pub fn id(&self) -> StockMovementId {
        self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn item_id(&self) -> StockItemId {
        self.item_id
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn signed_delta(&self) -> i64 {
        self.signed_delta
    }

    pub fn price(&self) -> &Money {
        &self.price
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Re-check a movement loaded from outside the ledger (snapshots).
    pub fn validate(&self) -> DomainResult<()> {
        if self.sequence == 0 {
            return Err(DomainError::invariant("ledger sequence starts at 1"));
        }
        MovementDraft {
            owner_id: self.owner_id,
            item_id: self.item_id,
            kind: self.kind,
            quantity: self.quantity,
            signed_delta: self.signed_delta,
            price: self.price.clone(),
            reason: self.reason.clone(),
            occurred_at: self.created_at,
        }
        .validate()
    }
}

impl Entity for StockMovement {
    type Id = StockMovementId;

    fn entity_id(&self) -> Self::Id {
        self.id
    }
}

/// Net effect of a set of movements.
pub fn ledger_balance<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> i64 {
    movements.into_iter().map(|m| m.signed_delta).sum()
}

/// Audit display order: newest first, ties broken by insertion sequence.
pub fn sort_newest_first(movements: &mut [StockMovement]) {
    movements.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
}
