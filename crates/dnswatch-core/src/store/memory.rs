// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Purpose
//
// Keeps the last snapshot in process memory. Nothing survives a restart,
// so the first cycle of every run reports the whole table as added.
//
// ## When to Use
//
// - Tests
// - Embedding the sync engine in a long-running process

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StoreConfig;
use crate::traits::{SnapshotStore, SnapshotStoreFactory, StoredSnapshot};

/// In-memory snapshot store
///
/// Clones share the same snapshot, so a test can keep a handle and inspect
/// what the engine wrote.
///
/// # Example
///
/// ```rust,no_run
/// use dnswatch_core::store::MemorySnapshotStore;
/// use dnswatch_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySnapshotStore::new();
///     store.write("table\n").await?;
///
///     let snapshot = store.read().await?;
///     assert_eq!(snapshot.text, "table\n");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    text: Arc<RwLock<Option<String>>>,
    writes: Arc<AtomicUsize>,
}

impl MemorySnapshotStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store holding an initial snapshot
    pub fn with_snapshot(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(RwLock::new(Some(text.into()))),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current snapshot, if one was ever stored
    pub async fn snapshot(&self) -> Option<String> {
        self.text.read().await.clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self) -> Result<StoredSnapshot, Error> {
        let guard = self.text.read().await;
        Ok(StoredSnapshot::new(guard.clone().unwrap_or_default(), None))
    }

    async fn write(&self, text: &str) -> Result<Option<String>, Error> {
        let mut guard = self.text.write().await;
        *guard = Some(text.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemorySnapshotStore`]
#[derive(Debug, Default)]
pub struct MemorySnapshotStoreFactory;

#[async_trait]
impl SnapshotStoreFactory for MemorySnapshotStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Box<dyn SnapshotStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Box::new(MemorySnapshotStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_reads_empty() {
        let store = MemorySnapshotStore::new();
        let snapshot = tokio_test::block_on(store.read()).unwrap();
        assert_eq!(snapshot.text, "");
        assert!(snapshot.location.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemorySnapshotStore::with_snapshot("old\n");
        assert_eq!(store.read().await.unwrap().text, "old\n");

        let handle = store.clone();
        store.write("new\n").await.unwrap();

        assert_eq!(handle.snapshot().await.as_deref(), Some("new\n"));
        assert_eq!(handle.write_count(), 1);
    }

    #[tokio::test]
    async fn test_factory_rejects_other_configs() {
        let factory = MemorySnapshotStoreFactory;
        assert!(factory.create(&StoreConfig::Memory).await.is_ok());

        let file = StoreConfig::File {
            path: "/tmp/x.json".to_string(),
        };
        assert!(factory.create(&file).await.is_err());
    }
}
