//! Persistence gateway for the tracked account id set.
//!
//! Only account identifiers survive a restart. Subscribers and balances
//! are deliberately not persisted: restored accounts come back with an
//! empty subscriber set and a placeholder balance that the first poll
//! replaces silently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracker_core::AccountId;
use tracing::debug;

/// Errors from the persistence gateway. Save failures are logged and
/// swallowed by callers; the in-memory registry stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Load/save contract for the tracked id set.
#[async_trait]
pub trait TrackedStore: Send + Sync {
    async fn load(&self) -> Result<HashSet<AccountId>, StoreError>;
    async fn save(&self, ids: &HashSet<AccountId>) -> Result<(), StoreError>;
}

/// On-disk file shape: `{ "addresses": [...] }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackedFile {
    #[serde(default)]
    addresses: Vec<AccountId>,
}

/// JSON file store under a data directory.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open (and if necessary initialize) the store under `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join("tracked-addresses.json");
        if tokio::fs::try_exists(&path).await? {
            return Ok(Self { path });
        }
        let empty = serde_json::to_vec(&TrackedFile::default())?;
        tokio::fs::write(&path, empty).await?;
        debug!(path = %path.display(), "Initialized tracked address file");
        Ok(Self { path })
    }
}

#[async_trait]
impl TrackedStore for JsonFileStore {
    async fn load(&self) -> Result<HashSet<AccountId>, StoreError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let file: TrackedFile = serde_json::from_slice(&bytes)?;
        Ok(file.addresses.into_iter().collect())
    }

    async fn save(&self, ids: &HashSet<AccountId>) -> Result<(), StoreError> {
        let mut addresses: Vec<AccountId> = ids.iter().cloned().collect();
        addresses.sort();
        let bytes = serde_json::to_vec(&TrackedFile { addresses })?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    ids: std::sync::Mutex<HashSet<AccountId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the last saved id set.
    pub fn saved(&self) -> HashSet<AccountId> {
        self.ids.lock().expect("store lock poisoned").clone()
    }
}

#[async_trait]
impl TrackedStore for MemoryStore {
    async fn load(&self) -> Result<HashSet<AccountId>, StoreError> {
        Ok(self.saved())
    }

    async fn save(&self, ids: &HashSet<AccountId>) -> Result<(), StoreError> {
        *self.ids.lock().expect("store lock poisoned") = ids.clone();
        Ok(())
    }
}
