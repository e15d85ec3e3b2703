//! Core traits for dnswatch
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DomainProvider`]: Read domains and records from a DNS-hosting provider
//! - [`SnapshotStore`]: Read and persist the last-known-good snapshot

pub mod domain_provider;
pub mod snapshot_store;

pub use domain_provider::{Domain, DomainId, DomainProvider, DomainProviderFactory, Record};
pub use snapshot_store::{SnapshotStore, SnapshotStoreFactory, StoredSnapshot};
