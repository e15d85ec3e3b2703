// # Snapshot Store Implementations
//
// This module provides implementations of the SnapshotStore trait that live
// in the core crate. Remote stores live in their own crates.

pub mod file;
pub mod memory;

pub use file::{FileSnapshotStore, FileSnapshotStoreFactory};
pub use memory::{MemorySnapshotStore, MemorySnapshotStoreFactory};
