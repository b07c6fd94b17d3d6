use thiserror::Error;

use stockbook_core::DomainError;

use crate::store::StoreError;

/// Failure reported by an inventory operation.
///
/// - **Validation**: malformed or out-of-range input; fix the input and retry
/// - **NotFound**: the referenced category or item does not exist
/// - **Conflict**: the operation would break a referential or business rule
/// - **InsufficientStock**: a stock-out asked for more than is on hand
/// - **Storage**: the backend failed; nothing was applied
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("insufficient stock (requested {requested}, available {available})")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("storage failure: {0}")]
    Storage(StoreError),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => InventoryError::Validation(msg),
            DomainError::InvalidId(msg) => InventoryError::Validation(msg),
            DomainError::NotFound(what) => InventoryError::NotFound(what),
            DomainError::Conflict(msg) => InventoryError::Conflict(msg),
            DomainError::InvariantViolation(msg) => InventoryError::Conflict(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => InventoryError::InsufficientStock {
                requested,
                available,
            },
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => InventoryError::NotFound(what),
            StoreError::Duplicate(msg) => InventoryError::Conflict(msg),
            StoreError::Conflict(msg) => InventoryError::Conflict(msg),
            StoreError::Invalid(msg) => InventoryError::Validation(msg),
            StoreError::Poisoned | StoreError::Backend(_) => InventoryError::Storage(value),
        }
    }
}
