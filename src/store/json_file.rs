use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{PantryStore, UnitOfWork, UserLedger};
use crate::error::StorageError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    users: BTreeMap<String, UserLedger>,
}

/// Keeps every user's ledger in one JSON document.
///
/// The file lock is held for the lifetime of a unit of work, so writers are
/// serialized across users as well as within one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Arc<Mutex<StoreState>>,
}

pub struct JsonFileTx {
    user_id: String,
    guard: OwnedMutexGuard<StoreState>,
    working: UserLedger,
}

impl JsonFileStore {
    /// Opens the state file, starting empty when it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => StoreState::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), users = state.users.len(), "opened pantry state file");
        Ok(Self { path, state: Arc::new(Mutex::new(state)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StorageError> {
        let body = serde_json::to_vec_pretty(state)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PantryStore for JsonFileStore {
    type Tx = JsonFileTx;

    async fn begin(&self, user_id: &str) -> Result<Self::Tx, StorageError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.users.get(user_id).cloned().unwrap_or_default();
        Ok(JsonFileTx { user_id: user_id.to_string(), guard, working })
    }

    /// The in-memory state only advances once the file write has landed.
    async fn commit(&self, tx: Self::Tx) -> Result<(), StorageError> {
        let JsonFileTx { user_id, mut guard, working } = tx;
        let mut next = guard.clone();
        next.users.insert(user_id, working);
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

impl UnitOfWork for JsonFileTx {
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
