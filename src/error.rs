use thiserror::Error;

use crate::units::UnitCategory;

/// Failure to express one quantity in another unit.
///
/// These never abort a recipe completion: the affected ingredient is reported
/// as missing for quantity purposes and processing continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("unknown unit: '{0}'")]
    UnknownUnit(String),
    #[error("cannot convert {from_unit} ({from:?}) to {to_unit} ({to:?})")]
    IncompatibleCategory {
        from_unit: String,
        from: UnitCategory,
        to_unit: String,
        to: UnitCategory,
    },
    #[error("invalid quantity: {0}")]
    InvalidQuantity(f64),
}

/// Errors raised by a pantry/history storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("pantry CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("pantry item not found: {item_id}")]
    ItemNotFound { item_id: String },
    #[error("duplicate pantry item id: {item_id}")]
    DuplicateItemId { item_id: String },
    #[error("history record not found: {transaction_id}")]
    HistoryNotFound { transaction_id: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors returned by the reconciliation service.
///
/// Only `Storage` aborts an operation after work began; everything else is either a
/// rejected request (nothing was touched) or a "nothing to revert" answer.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("nothing to revert: no completion found for {lookup}")]
    TransactionNotFound { lookup: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ReconcileError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::TransactionNotFound { .. })
    }
}
