use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::adapters::traits::{CheckpointStore, CredentialStore};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct CheckpointState {
    last_sync: Option<DateTime<Utc>>,
    pending: Vec<String>,
    pending_writes: Vec<usize>,
}

/// Process-local checkpoint, used for tests and throwaway runs
pub struct MemoryCheckpointStore {
    state: RwLock<CheckpointState>,
    max_pending: usize,
}

impl MemoryCheckpointStore {
    pub fn new(max_pending: usize) -> Self {
        Self {
            state: RwLock::new(CheckpointState::default()),
            max_pending,
        }
    }

    pub fn with_state(
        max_pending: usize,
        last_sync: Option<DateTime<Utc>>,
        pending: Vec<String>,
    ) -> Self {
        let store = Self::new(max_pending);
        {
            let mut state = store.state.write();
            state.last_sync = last_sync;
            state.pending = pending;
        }
        store
    }

    /// Length of every pending list ever written, in order
    pub fn pending_write_sizes(&self) -> Vec<usize> {
        self.state.read().pending_writes.clone()
    }

    pub fn snapshot(&self) -> (Option<DateTime<Utc>>, Vec<String>) {
        let state = self.state.read();
        (state.last_sync, state.pending.clone())
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn last_sync_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.state.read().last_sync)
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> AppResult<()> {
        self.state.write().last_sync = Some(at);
        Ok(())
    }

    async fn pending_ids(&self) -> AppResult<Vec<String>> {
        Ok(self.state.read().pending.clone())
    }

    async fn set_pending_ids(&self, ids: &[String]) -> AppResult<()> {
        if ids.len() > self.max_pending {
            return Err(AppError::Checkpoint(format!(
                "{} pending ids exceeds the limit of {}",
                ids.len(),
                self.max_pending
            )));
        }
        let mut state = self.state.write();
        state.pending_writes.push(ids.len());
        state.pending = ids.to_vec();
        Ok(())
    }
}

/// Refresh credential held in memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    secret: RwLock<String>,
    saves: RwLock<Vec<String>>,
}

impl MemoryCredentialStore {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: RwLock::new(secret.into()),
            saves: RwLock::new(Vec::new()),
        }
    }

    /// Every value passed to `save`, oldest first
    pub fn saved(&self) -> Vec<String> {
        self.saves.read().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> AppResult<String> {
        let secret = self.secret.read().clone();
        if secret.is_empty() {
            return Err(AppError::Auth("no refresh token stored".into()));
        }
        Ok(secret)
    }

    async fn save(&self, secret: &str) -> AppResult<()> {
        *self.secret.write() = secret.to_string();
        self.saves.write().push(secret.to_string());
        Ok(())
    }
}
