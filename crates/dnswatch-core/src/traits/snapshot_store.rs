// # Snapshot Store Trait
//
// Defines the interface for reading and persisting the last-known-good
// snapshot text.
//
// ## Purpose
//
// The stored snapshot is what the freshly rendered table is compared
// against. A store behaves like a single remote key/value blob: one read,
// one write, both returning a location hint (e.g. a URL) for reports.
//
// ## Implementations
//
// - Memory: `MemorySnapshotStore` (tests, embedding)
// - File: `FileSnapshotStore` (local JSON document, crash safe)
// - Gist: `dnswatch-store-gist` crate
//
// ## Usage
//
// ```rust,ignore
// use dnswatch_core::SnapshotStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* SnapshotStore implementation */;
//
//     let old = store.read().await?;
//     let location = store.write("new table\n").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// A snapshot read back from a store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSnapshot {
    /// Canonical table text
    pub text: String,
    /// Where the snapshot lives, when the store can tell
    pub location: Option<String>,
}

impl StoredSnapshot {
    /// Create a stored snapshot
    pub fn new(text: impl Into<String>, location: Option<String>) -> Self {
        Self {
            text: text.into(),
            location,
        }
    }
}

/// Trait for snapshot store implementations
///
/// # Thread Safety
///
/// The engine reads the store concurrently with the record fetch, so
/// implementations must be `Send + Sync`.
///
/// # Retries
///
/// Stores make a single attempt per call. `SyncEngine` wraps reads and
/// writes in its own bounded retry.
///
/// # Missing Snapshots
///
/// A store that has never been written reads as an empty snapshot, so the
/// first cycle reports every record as added.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the stored snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(StoredSnapshot)`: The stored text and its location
    /// - `Err(Error)`: If the store could not be read
    async fn read(&self) -> Result<StoredSnapshot, crate::Error>;

    /// Replace the stored snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Option<String>)`: Location of the written snapshot
    /// - `Err(Error)`: If the write failed
    async fn write(&self, text: &str) -> Result<Option<String>, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Factory trait for creating snapshot stores from configuration
#[async_trait]
pub trait SnapshotStoreFactory: Send + Sync {
    /// Create a SnapshotStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Box<dyn SnapshotStore>, crate::Error>;
}
