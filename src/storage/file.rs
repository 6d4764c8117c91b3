use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::adapters::traits::{CheckpointStore, CredentialStore};
use crate::error::{AppError, AppResult};

/// On-disk checkpoint layout. Pending ids are comma-joined.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CheckpointFile {
    #[serde(default)]
    last_sync_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pending: String,
}

impl CheckpointFile {
    fn pending_ids(&self) -> Vec<String> {
        self.pending
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// JSON checkpoint file in the state directory
pub struct FileCheckpointStore {
    path: PathBuf,
    max_pending: usize,
    lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, max_pending: usize) -> Self {
        Self {
            path: path.into(),
            max_pending,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> AppResult<CheckpointFile> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::Checkpoint(format!("corrupt checkpoint {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(CheckpointFile::default()),
            Err(e) => Err(AppError::Checkpoint(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn store(&self, file: &CheckpointFile) -> AppResult<()> {
        let bytes = serde_json::to_vec_pretty(file)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| AppError::Checkpoint(format!("writing {}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn last_sync_time(&self) -> AppResult<Option<DateTime<Utc>>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.last_sync_time)
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> AppResult<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        file.last_sync_time = Some(at);
        self.store(&file).await?;
        debug!("💾 Last sync time set to {}", at);
        Ok(())
    }

    async fn pending_ids(&self) -> AppResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.pending_ids())
    }

    async fn set_pending_ids(&self, ids: &[String]) -> AppResult<()> {
        if ids.len() > self.max_pending {
            return Err(AppError::Checkpoint(format!(
                "{} pending ids exceeds the limit of {}",
                ids.len(),
                self.max_pending
            )));
        }
        if let Some(bad) = ids.iter().find(|id| id.contains(',') || id.trim() != id.as_str()) {
            return Err(AppError::Checkpoint(format!(
                "donation id {:?} cannot be stored in a comma-joined list",
                bad
            )));
        }
        let _guard = self.lock.lock().await;
        let mut file = self.load().await?;
        file.pending = ids.join(",");
        self.store(&file).await
    }
}

/// Refresh token kept in a single-line file
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> AppResult<String> {
        let missing = || {
            AppError::Auth(format!(
                "no refresh token at {}; run `giftbridge auth` first",
                self.path.display()
            ))
        };

        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Err(missing())
                } else {
                    Ok(token.to_string())
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(missing()),
            Err(e) => Err(AppError::Auth(format!(
                "reading {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, secret: &str) -> AppResult<()> {
        write_atomic(&self.path, secret.as_bytes())
            .await
            .map_err(|e| AppError::Auth(format!("saving refresh token: {}", e)))?;
        restrict_permissions(&self.path).await?;
        debug!("💾 Refresh token saved to {}", self.path.display());
        Ok(())
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> AppResult<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| AppError::Auth(format!("restricting {}: {}", path.display(), e)))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> AppResult<()> {
    Ok(())
}
