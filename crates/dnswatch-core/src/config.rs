//! Configuration types for dnswatch
//!
//! This module defines all configuration structures used throughout the crate.
//! Configuration is passed explicitly into constructors; nothing in the core
//! reads process-wide state.

use serde::{Deserialize, Serialize};

/// Main dnswatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Snapshot store configuration
    pub store: StoreConfig,

    /// Sync cycle settings
    #[serde(default)]
    pub sync: SyncConfig,
}

impl WatchConfig {
    /// Create a new configuration with defaults
    pub fn new(provider: ProviderConfig, store: StoreConfig) -> Self {
        Self {
            provider,
            store,
            sync: SyncConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.store.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// DNSPod form API
    Dnspod {
        /// API token in `ID,Token` form
        login_token: String,
        /// Override of the API base URL (tests, mirrors)
        #[serde(default)]
        api_base: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Dnspod { login_token, .. } => {
                if login_token.is_empty() {
                    return Err(crate::Error::config("DNSPod login token cannot be empty"));
                }
                if !login_token.contains(',') {
                    return Err(crate::Error::config(
                        "DNSPod login token must have the form ID,Token",
                    ));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Dnspod { .. } => "dnspod",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Dnspod {
            login_token: String::new(),
            api_base: None,
        }
    }
}

/// Snapshot store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// One file inside a GitHub gist
    Gist {
        /// GitHub token with gist scope
        token: String,
        /// Gist identifier
        gist_id: String,
        /// File inside the gist holding the table
        #[serde(default = "default_gist_file_name")]
        file_name: String,
        /// Proxy used for GitHub requests only
        #[serde(default)]
        proxy_url: Option<String>,
    },

    /// Local JSON document
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom snapshot store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Gist {
                token,
                gist_id,
                file_name,
                proxy_url,
            } => {
                if token.is_empty() {
                    return Err(crate::Error::config("GitHub token cannot be empty"));
                }
                if gist_id.is_empty() {
                    return Err(crate::Error::config("Gist id cannot be empty"));
                }
                if file_name.is_empty() {
                    return Err(crate::Error::config("Gist file name cannot be empty"));
                }
                if let Some(proxy) = proxy_url
                    && !proxy.contains("://")
                {
                    return Err(crate::Error::config(format!(
                        "Proxy URL must include a scheme. Got: {}",
                        proxy
                    )));
                }
                Ok(())
            }
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Snapshot file path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
            StoreConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Gist { .. } => "gist",
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

fn default_gist_file_name() -> String {
    "DNS".to_string()
}

/// When an observed difference between the stored and the freshly rendered
/// snapshot is trusted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmPolicy {
    /// Trust the difference seen on the final attempt
    #[default]
    LastAttempt,
    /// Trust a difference only once two consecutive attempts rendered the
    /// same new snapshot
    ConsecutiveMatch,
}

/// Sync cycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Number of fetch-and-compare attempts before a difference is accepted
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay between fetch-and-compare attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Attempts for each snapshot store read or write (no delay between)
    #[serde(default = "default_store_max_attempts")]
    pub store_max_attempts: usize,

    /// Rule for trusting a difference
    #[serde(default)]
    pub confirm_policy: ConfirmPolicy,

    /// Upper bound on concurrent per-domain record fetches
    ///
    /// `None` spawns one task per domain.
    #[serde(default)]
    pub max_concurrent_domains: Option<usize>,

    /// Report changes without writing the new snapshot
    #[serde(default)]
    pub dry_run: bool,

    /// Capacity of the sync event channel
    ///
    /// When full, events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncConfig {
    /// Validate the sync settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("max_attempts must be at least 1"));
        }
        if self.confirm_policy == ConfirmPolicy::ConsecutiveMatch && self.max_attempts < 2 {
            return Err(crate::Error::config(
                "consecutive_match needs max_attempts of at least 2",
            ));
        }
        if self.store_max_attempts == 0 {
            return Err(crate::Error::config("store_max_attempts must be at least 1"));
        }
        if self.max_concurrent_domains == Some(0) {
            return Err(crate::Error::config(
                "max_concurrent_domains must be at least 1 when set",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "event_channel_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
            store_max_attempts: default_store_max_attempts(),
            confirm_policy: ConfirmPolicy::default(),
            max_concurrent_domains: None,
            dry_run: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_max_attempts() -> usize {
    2
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_store_max_attempts() -> usize {
    2
}

fn default_event_channel_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.max_attempts, 2);
        assert_eq!(sync.retry_delay_secs, 5);
        assert_eq!(sync.store_max_attempts, 2);
        assert_eq!(sync.confirm_policy, ConfirmPolicy::LastAttempt);
        assert!(sync.max_concurrent_domains.is_none());
        assert!(!sync.dry_run);
    }

    #[test]
    fn test_sync_defaults_from_empty_json() {
        let sync: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(sync.max_attempts, 2);
        assert_eq!(sync.event_channel_capacity, 64);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = WatchConfig::new(
            ProviderConfig::Dnspod {
                login_token: "12345,abcdef".to_string(),
                api_base: None,
            },
            StoreConfig::Memory,
        );
        assert!(config.validate().is_ok());

        config.sync.max_attempts = 0;
        assert!(config.validate().is_err());

        config.sync.max_attempts = 1;
        config.sync.max_concurrent_domains = Some(0);
        assert!(config.validate().is_err());

        config.sync.max_concurrent_domains = None;
        config.sync.confirm_policy = ConfirmPolicy::ConsecutiveMatch;
        assert!(config.validate().is_err());
        config.sync.max_attempts = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dnspod_token_shape() {
        let provider = ProviderConfig::Dnspod {
            login_token: "no-comma".to_string(),
            api_base: None,
        };
        assert!(provider.validate().is_err());
        assert_eq!(provider.type_name(), "dnspod");
    }

    #[test]
    fn test_gist_config_from_json() {
        let store: StoreConfig = serde_json::from_value(serde_json::json!({
            "type": "gist",
            "token": "ghp_x",
            "gist_id": "abc123",
        }))
        .unwrap();

        match &store {
            StoreConfig::Gist { file_name, proxy_url, .. } => {
                assert_eq!(file_name, "DNS");
                assert!(proxy_url.is_none());
            }
            other => panic!("unexpected store config: {:?}", other),
        }
        assert!(store.validate().is_ok());
        assert_eq!(store.type_name(), "gist");
    }

    #[test]
    fn test_proxy_needs_scheme() {
        let store = StoreConfig::Gist {
            token: "ghp_x".to_string(),
            gist_id: "abc123".to_string(),
            file_name: "DNS".to_string(),
            proxy_url: Some("127.0.0.1:8080".to_string()),
        };
        assert!(store.validate().is_err());
    }
}
