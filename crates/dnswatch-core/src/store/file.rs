// # File Snapshot Store
//
// File-based implementation of SnapshotStore with crash recovery.
//
// ## Purpose
//
// Keeps the last-known-good table in a local JSON document so a run can be
// compared against the previous one without any remote service.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on read
// - Automatic backup: Keeps .backup of the previous document
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "saved_at": "2025-01-09T12:00:00Z",
//   "content": "Enabled   Updated At ...\n"
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::{SnapshotStore, SnapshotStoreFactory, StoredSnapshot};

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

const STORE_NAME: &str = "file";

/// Serializable snapshot file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct SnapshotDocument {
    version: String,
    saved_at: DateTime<Utc>,
    content: String,
}

/// File-based snapshot store with crash recovery
///
/// Every read goes to disk, so edits made by another process between
/// cycles are picked up.
///
/// # Example
///
/// ```rust,no_run
/// use dnswatch_core::store::FileSnapshotStore;
/// use dnswatch_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::new("/var/lib/dnswatch/snapshot.json").await?;
///
///     store.write("table\n").await?;
///     assert_eq!(store.read().await?.text, "table\n");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl FileSnapshotStore {
    /// Create a file snapshot store
    ///
    /// Creates parent directories if needed. The file itself is only
    /// created by the first write.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create snapshot directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self {
            path,
            io_lock: Mutex::new(()),
        })
    }

    /// Path of the snapshot document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn location(&self) -> Option<String> {
        Some(self.path.display().to_string())
    }

    /// Load the document with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load the main document
    /// 2. If it does not parse, try loading the backup
    /// 3. If the backup fails too, start from an empty snapshot
    async fn load_with_recovery(path: &Path) -> Result<Option<SnapshotDocument>, Error> {
        let err = match Self::load_document(path).await {
            Ok(document) => return Ok(document),
            Err(Error::Json(e)) => e,
            Err(other) => return Err(other),
        };

        tracing::warn!(
            "Snapshot file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty snapshot.");
            return Ok(None);
        }

        match Self::load_document(&backup_path).await {
            Ok(document) => {
                tracing::info!("Recovered snapshot from backup {}", backup_path.display());

                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore snapshot file from backup: {}", restore_err);
                }

                Ok(document)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also unreadable: {}. Starting with an empty snapshot.",
                    backup_err
                );
                Ok(None)
            }
        }
    }

    /// Load one document; parse failures surface as `Error::Json`
    async fn load_document(path: &Path) -> Result<Option<SnapshotDocument>, Error> {
        if !path.exists() {
            tracing::debug!("Snapshot file does not exist: {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(
                STORE_NAME,
                format!("Failed to read snapshot file {}: {}", path.display(), e),
            )
        })?;

        let document: SnapshotDocument = serde_json::from_str(&content)?;

        if document.version != SNAPSHOT_FILE_VERSION {
            tracing::warn!(
                "Snapshot file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                SNAPSHOT_FILE_VERSION,
                document.version
            );
        }

        Ok(Some(document))
    }

    /// Write the document atomically
    async fn write_document(&self, document: &SnapshotDocument) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(document).map_err(|e| {
            Error::store(STORE_NAME, format!("Failed to serialize snapshot: {}", e))
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(
                    STORE_NAME,
                    format!("Failed to create temp file {}: {}", temp_path.display(), e),
                )
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(
                    STORE_NAME,
                    format!("Failed to write to temp file {}: {}", temp_path.display(), e),
                )
            })?;

            file.flush().await.map_err(|e| {
                Error::store(
                    STORE_NAME,
                    format!("Failed to flush temp file {}: {}", temp_path.display(), e),
                )
            })?;
        }

        // Back up the previous document only if it parses
        if matches!(Self::load_document(&self.path).await, Ok(Some(_))) {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(
                STORE_NAME,
                format!(
                    "Failed to rename {} to {}: {}",
                    temp_path.display(),
                    self.path.display(),
                    e
                ),
            )
        })?;

        tracing::trace!("Snapshot written to file: {}", self.path.display());
        Ok(())
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::store(
                STORE_NAME,
                format!(
                    "Failed to restore from backup {} to {}: {}",
                    backup_path.display(),
                    path.display(),
                    e
                ),
            )
        })?;

        tracing::info!("Restored snapshot file from backup");
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
impl SnapshotStore for FileSnapshotStore {
    async fn read(&self) -> Result<StoredSnapshot, Error> {
        let _guard = self.io_lock.lock().await;
        let text = Self::load_with_recovery(&self.path)
            .await?
            .map(|document| document.content)
            .unwrap_or_default();

        Ok(StoredSnapshot::new(text, self.location()))
    }

    async fn write(&self, text: &str) -> Result<Option<String>, Error> {
        let _guard = self.io_lock.lock().await;
        let document = SnapshotDocument {
            version: SNAPSHOT_FILE_VERSION.to_string(),
            saved_at: Utc::now(),
            content: text.to_string(),
        };

        self.write_document(&document).await?;
        Ok(self.location())
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for [`FileSnapshotStore`]
#[derive(Debug, Default)]
pub struct FileSnapshotStoreFactory;

#[async_trait]
impl SnapshotStoreFactory for FileSnapshotStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn SnapshotStore>, Error> {
        match config {
            StoreConfig::File { path } => Ok(Box::new(FileSnapshotStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.json");

        let store = FileSnapshotStore::new(&path).await.unwrap();
        let snapshot = store.read().await.unwrap();
        assert_eq!(snapshot.text, "");
        assert_eq!(snapshot.location, Some(path.display().to_string()));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let store = FileSnapshotStore::new(&path).await.unwrap();
        let location = store.write("header\nrow\n").await.unwrap();
        assert_eq!(location, Some(path.display().to_string()));
        drop(store);

        let store2 = FileSnapshotStore::new(&path).await.unwrap();
        assert_eq!(store2.read().await.unwrap().text, "header\nrow\n");

        let raw = fs::read_to_string(&path).await.unwrap();
        let document: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(document["version"], "1.0");
        assert!(document["saved_at"].is_string());
    }

    #[tokio::test]
    async fn test_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let store = FileSnapshotStore::new(&path).await.unwrap();
        store.write("first\n").await.unwrap();
        store.write("second\n").await.unwrap();

        let backup_path = FileSnapshotStore::backup_path(&path);
        assert!(backup_path.exists(), "Backup file should exist after write");

        fs::write(&path, b"corrupted json data").await.unwrap();

        // The backup holds the document before the last write
        let recovered = store.read().await.unwrap();
        assert_eq!(recovered.text, "first\n");

        // The main file was restored from the backup
        let reread = FileSnapshotStore::new(&path).await.unwrap();
        assert_eq!(reread.read().await.unwrap().text, "first\n");
    }

    #[tokio::test]
    async fn test_corruption_without_backup_reads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        fs::write(&path, b"{not json").await.unwrap();

        let store = FileSnapshotStore::new(&path).await.unwrap();
        assert_eq!(store.read().await.unwrap().text, "");

        // A write replaces the corrupt file without backing it up
        store.write("fresh\n").await.unwrap();
        assert_eq!(store.read().await.unwrap().text, "fresh\n");
        assert!(!FileSnapshotStore::backup_path(&path).exists());
    }

    #[tokio::test]
    async fn test_repeated_writes_keep_last() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = FileSnapshotStore::new(&path).await.unwrap();

        for i in 0..10 {
            store.write(&format!("table {}\n", i)).await.unwrap();
        }

        let store2 = FileSnapshotStore::new(&path).await.unwrap();
        assert_eq!(store2.read().await.unwrap().text, "table 9\n");
    }

    #[tokio::test]
    async fn test_factory() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::File {
            path: dir.path().join("s.json").display().to_string(),
        };

        let store = FileSnapshotStoreFactory.create(&config).await.unwrap();
        assert_eq!(store.store_name(), "file");
        assert!(FileSnapshotStoreFactory.create(&StoreConfig::Memory).await.is_err());
    }
}
