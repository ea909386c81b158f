use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{PantryStore, UnitOfWork, UserLedger};
use crate::error::StorageError;
use crate::models::{HistoryRecord, PantryItem};

/// In-process store with one lock per user.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Arc<Mutex<HashMap<String, Arc<Mutex<UserLedger>>>>>,
}

pub struct MemoryTx {
    user_id: String,
    guard: OwnedMutexGuard<UserLedger>,
    working: UserLedger,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn user_ledger(&self, user_id: &str) -> Arc<Mutex<UserLedger>> {
        let mut users = self.users.lock().await;
        users.entry(user_id.to_string()).or_default().clone()
    }

    /// Replaces the user's pantry, keeping their history.
    pub async fn seed(&self, user_id: &str, items: Vec<PantryItem>) {
        let ledger = self.user_ledger(user_id).await;
        ledger.lock().await.items = items;
    }

    pub async fn seed_history(&self, user_id: &str, record: HistoryRecord) {
        let ledger = self.user_ledger(user_id).await;
        ledger.lock().await.history.push(record);
    }

    /// Committed state for a user.
    pub async fn ledger(&self, user_id: &str) -> UserLedger {
        let ledger = self.user_ledger(user_id).await;
        let snapshot = ledger.lock().await.clone();
        snapshot
    }
}

#[async_trait]
impl PantryStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, user_id: &str) -> Result<Self::Tx, StorageError> {
        let guard = self.user_ledger(user_id).await.lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTx { user_id: user_id.to_string(), guard, working })
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StorageError> {
        let MemoryTx { mut guard, working, .. } = tx;
        *guard = working;
        Ok(())
    }
}

impl UnitOfWork for MemoryTx {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn ledger(&self) -> &UserLedger {
        &self.working
    }

    fn ledger_mut(&mut self) -> &mut UserLedger {
        &mut self.working
    }
}
