//! Plugin-based provider registry
//!
//! The registry maps configuration type names to factories, so the binary
//! builds its domain provider and snapshot store without hardcoded
//! if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dnswatch_core::registry::ProviderRegistry;
//! use dnswatch_core::config::ProviderConfig;
//!
//! let registry = ProviderRegistry::with_builtin_stores();
//! dnswatch_provider_dnspod::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Adapter crates expose a `register` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("dnspod", Box::new(DnspodFactory));
//! }
//! ```

use crate::config::{ProviderConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileSnapshotStoreFactory, MemorySnapshotStoreFactory};
use crate::traits::{DomainProvider, DomainProviderFactory, SnapshotStore, SnapshotStoreFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of domain provider and snapshot store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered domain provider factories
    providers: RwLock<HashMap<String, Box<dyn DomainProviderFactory>>>,

    /// Registered snapshot store factories
    stores: RwLock<HashMap<String, Arc<dyn SnapshotStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `memory` and `file` stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemorySnapshotStoreFactory));
        registry.register_store("file", Box::new(FileSnapshotStoreFactory));
        registry
    }

    /// Register a domain provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "dnspod")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn DomainProviderFactory>,
    ) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register a snapshot store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "gist", "file")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&self, name: impl Into<String>, factory: Box<dyn SnapshotStoreFactory>) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a domain provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DomainProvider>)`: Created provider instance
    /// - `Err(Error)`: If the provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DomainProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a snapshot store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn SnapshotStore>)`: Created store instance
    /// - `Err(Error)`: If the store type is not registered or creation fails
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn SnapshotStore>> {
        let store_type = config.type_name();

        // Release the lock before calling async create
        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        factory.create(config).await
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a store type is registered
    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
