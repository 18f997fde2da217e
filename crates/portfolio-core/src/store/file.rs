// # File Connection Store
//
// File-based implementation of ConnectionStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<path>.tmp`, then rename over the main file
// - Backup: the previous main file is copied to `<path>.backup` before each write
// - Recovery: if the main file does not parse, the backup is loaded and
//   copied back over the main file
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "connections": {
//     "6c1d...": { "id": "6c1d...", "provider": "godaddy", "name": "Main", ... }
//   }
// }
// ```
//
// Inline credentials are written as-is; deployments that must keep secrets
// off disk bind connections to credential references instead.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::model::ConnectedProvider;
use crate::traits::ConnectionStore;

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based connection store
///
/// Every mutation rewrites the whole file; connection counts are small and
/// writes are rare compared to reads.
#[derive(Debug)]
pub struct FileConnectionStore {
    path: PathBuf,
    records: Arc<RwLock<HashMap<String, ConnectedProvider>>>,
    /// Serializes file writes so temp-file renames never interleave
    write_lock: Mutex<()>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    connections: HashMap<String, ConnectedProvider>,
}

impl FileConnectionStore {
    /// Create or load a file store
    ///
    /// 1. Create parent directories if needed
    /// 2. Load the main file
    /// 3. On a parse failure, fall back to the backup
    /// 4. If neither is usable, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::store(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let records = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            records: Arc::new(RwLock::new(records)),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the main store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load_with_recovery(path: &Path) -> Result<HashMap<String, ConnectedProvider>, Error> {
        match Self::load_file(path).await {
            Ok(records) => {
                tracing::debug!("Loaded {} connection(s) from {}", records.len(), path.display());
                Ok(records)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Connection store {} is corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(HashMap::new());
                }

                match Self::load_file(&backup_path).await {
                    Ok(records) => {
                        tracing::info!("Recovered {} connection(s) from backup", records.len());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(records)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unusable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(HashMap::new())
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    async fn load_file(path: &Path) -> Result<HashMap<String, ConnectedProvider>, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Loading anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.connections)
    }

    /// Write the current records atomically
    async fn write_file(&self) -> Result<(), Error> {
        let _write = self.write_lock.lock().await;

        let json = {
            let records = self.records.read().await;
            serde_json::to_string_pretty(&StoreFileFormat {
                version: STORE_FILE_VERSION.to_string(),
                connections: records.clone(),
            })?
        };

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Connection store written: {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl ConnectionStore for FileConnectionStore {
    async fn save(&self, record: &ConnectedProvider) -> Result<(), Error> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        self.write_file().await
    }

    async fn load(&self, id: &str) -> Result<Option<ConnectedProvider>, Error> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<ConnectedProvider>, Error> {
        let mut records: Vec<ConnectedProvider> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        let removed = self.records.write().await.remove(id).is_some();
        if removed {
            self.write_file().await
        } else {
            Ok(())
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        // Writes are immediate; flush just re-asserts the file on disk
        self.write_file().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConnectRequest, CredentialSource, SyncStatus};
    use tempfile::tempdir;

    fn record(name: &str) -> ConnectedProvider {
        ConnectedProvider::from_request(
            &ConnectRequest::new("godaddy", name).with_credential_reference("godaddy-main"),
        )
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");

        let store = FileConnectionStore::new(&path).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());

        let mut rec = record("Main");
        rec.last_sync_status = SyncStatus::Failed("timeout".into());
        rec.error_count = 2;
        store.save(&rec).await.unwrap();
        assert!(path.exists());

        let reopened = FileConnectionStore::new(&path).await.unwrap();
        let loaded = reopened.load(&rec.id).await.unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert_eq!(
            loaded.credentials,
            CredentialSource::Reference("godaddy-main".into())
        );
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("connections.json");

        let store = FileConnectionStore::new(&path).await.unwrap();
        let first = record("First");
        store.save(&first).await.unwrap();
        let second = record("Second");
        store.save(&second).await.unwrap();

        let backup_path = FileConnectionStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after second write");

        fs::write(&path, b"{ not json").await.unwrap();

        let recovered = FileConnectionStore::new(&path).await.unwrap();
        let all = recovered.load_all().await.unwrap();
        // Backup holds the state before the last write
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, first.id);
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/connections.json");

        let store = FileConnectionStore::new(&path).await.unwrap();
        let rec = record("Main");
        store.save(&rec).await.unwrap();
        store.delete(&rec.id).await.unwrap();

        let reopened = FileConnectionStore::new(&path).await.unwrap();
        assert!(reopened.load(&rec.id).await.unwrap().is_none());
    }
}
