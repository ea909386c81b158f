use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::StorageError;
use crate::models::{HistoryLookup, HistoryRecord, PantryItem, QuantityUpdate};
use crate::reconcile::find_revertible;

/// One user's pantry plus the append-only log of their completions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserLedger {
    #[serde(default)]
    pub items: Vec<PantryItem>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl UserLedger {
    pub fn new(items: Vec<PantryItem>) -> Self {
        Self { items, history: Vec::new() }
    }

    /// Swaps in a new pantry. Item ids must be unique since updates address
    /// items by id.
    pub fn replace_items(&mut self, items: Vec<PantryItem>) -> Result<(), StorageError> {
        if let Some(item_id) = first_duplicate_id(&items) {
            return Err(StorageError::DuplicateItemId { item_id: item_id.to_string() });
        }
        self.items = items;
        Ok(())
    }

    /// Writes absolute quantities. All ids are checked before anything is
    /// written; negative results are clamped to zero.
    pub fn apply_updates(&mut self, updates: &[QuantityUpdate]) -> Result<(), StorageError> {
        let mut positions = Vec::with_capacity(updates.len());
        for update in updates {
            let position = self
                .items
                .iter()
                .position(|item| item.id == update.item_id)
                .ok_or_else(|| StorageError::ItemNotFound { item_id: update.item_id.clone() })?;
            if !update.new_quantity.is_finite() {
                return Err(StorageError::Backend(format!(
                    "non-finite quantity {} for item {}",
                    update.new_quantity, update.item_id
                )));
            }
            positions.push(position);
        }

        for (position, update) in positions.into_iter().zip(updates) {
            self.items[position].quantity = update.new_quantity.max(0.0);
        }
        Ok(())
    }

    pub fn append_history(&mut self, record: HistoryRecord) -> Result<(), StorageError> {
        if self.history.iter().any(|existing| existing.transaction_id == record.transaction_id) {
            return Err(StorageError::Backend(format!(
                "duplicate transaction id {}",
                record.transaction_id
            )));
        }
        self.history.push(record);
        Ok(())
    }

    pub fn find_history(&self, lookup: &HistoryLookup) -> Option<&HistoryRecord> {
        find_revertible(&self.history, lookup)
    }

    pub fn mark_reverted(&mut self, transaction_id: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let record = self
            .history
            .iter_mut()
            .find(|record| record.transaction_id == transaction_id)
            .ok_or_else(|| StorageError::HistoryNotFound { transaction_id: transaction_id.to_string() })?;
        record.reverted_at = Some(at);
        Ok(())
    }
}

pub fn first_duplicate_id(items: &[PantryItem]) -> Option<&str> {
    let mut seen = HashSet::new();
    items.iter().map(|item| item.id.as_str()).find(|id| !seen.insert(*id))
}
