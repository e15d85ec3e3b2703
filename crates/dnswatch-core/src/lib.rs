// # dnswatch-core
//
// Core library for DNS table snapshotting and change detection.
//
// ## Architecture Overview
//
// - **DomainProvider**: Trait for reading domains and records from a provider API
// - **SnapshotStore**: Trait for reading and persisting the last-known-good table
// - **RecordFetcher**: Concurrent per-domain record fetch
// - **table**: Canonical, sorted, fixed-width rendering of a record set
// - **diff / detector**: Line diff and change report between two tables
// - **SyncEngine**: One fetch → compare → retry → report → persist cycle
// - **ProviderRegistry**: Plugin-based registry for providers and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic never talks HTTP; adapters do
// 2. **Determinism**: The same records always render to the same bytes
// 3. **Plugin-Based**: Providers and stores are registered, not hardcoded
// 4. **Library-First**: The binary is a thin shell over `SyncEngine`

pub mod config;
pub mod detector;
pub mod diff;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod registry;
pub mod store;
pub mod table;
pub mod traits;

// Re-export core types for convenience
pub use config::{ConfirmPolicy, ProviderConfig, StoreConfig, SyncConfig, WatchConfig};
pub use detector::{ChangeKind, Comparison, DiffEntry, compare};
pub use engine::{ChangeReport, SyncEngine, SyncEvent, SyncOutcome};
pub use error::{Error, Result};
pub use fetcher::{DomainOutcome, FetchReport, RecordFetcher};
pub use registry::ProviderRegistry;
pub use store::{FileSnapshotStore, MemorySnapshotStore};
pub use table::{RecordSet, render, render_records};
pub use traits::{Domain, DomainId, DomainProvider, Record, SnapshotStore, StoredSnapshot};
