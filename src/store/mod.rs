//! Pantry and history persistence.
//!
//! A store hands out one unit of work per user at a time. The unit of work
//! holds a private working copy of that user's pantry and completion history;
//! nothing becomes visible until [`PantryStore::commit`] succeeds, and a unit
//! of work dropped without commit changes nothing. Holding one is the per-user
//! serialization point for `complete` and `revert`.

pub mod json_file;
pub mod ledger;
pub mod memory;
pub mod pantry_csv;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::models::{HistoryLookup, HistoryRecord, PantryItem, QuantityUpdate};

pub use json_file::JsonFileStore;
pub use ledger::UserLedger;
pub use memory::MemoryStore;
pub use pantry_csv::load_pantry_csv;

#[async_trait]
pub trait PantryStore: Send + Sync {
    type Tx: UnitOfWork + Send;

    /// Waits for exclusive access to the user's pantry.
    async fn begin(&self, user_id: &str) -> Result<Self::Tx, StorageError>;

    /// Publishes pantry mutations and history changes together.
    async fn commit(&self, tx: Self::Tx) -> Result<(), StorageError>;
}

/// Operations available inside one unit of work.
///
/// Implementors only expose their working ledger; the pantry/history
/// semantics live in [`UserLedger`].
pub trait UnitOfWork {
    fn user_id(&self) -> &str;
    fn ledger(&self) -> &UserLedger;
    fn ledger_mut(&mut self) -> &mut UserLedger;

    fn load_snapshot(&self) -> Vec<PantryItem> {
        self.ledger().items.clone()
    }

    fn apply_deltas(&mut self, updates: &[QuantityUpdate]) -> Result<(), StorageError> {
        self.ledger_mut().apply_updates(updates)
    }

    fn save_history(&mut self, record: HistoryRecord) -> Result<(), StorageError> {
        self.ledger_mut().append_history(record)
    }

    fn find_history(&self, lookup: &HistoryLookup) -> Option<HistoryRecord> {
        self.ledger().find_history(lookup).cloned()
    }

    fn mark_reverted(&mut self, transaction_id: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.ledger_mut().mark_reverted(transaction_id, at)
    }

    fn replace_pantry(&mut self, items: Vec<PantryItem>) -> Result<(), StorageError> {
        self.ledger_mut().replace_items(items)
    }
}
