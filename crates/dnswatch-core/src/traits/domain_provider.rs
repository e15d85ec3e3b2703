// # Domain Provider Trait
//
// Defines the interface for reading domains and DNS records from a
// DNS-hosting provider's API.
//
// ## Implementations
//
// - DNSPod: `dnswatch-provider-dnspod` crate
//
// ## Usage
//
// ```rust,ignore
// use dnswatch_core::DomainProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DomainProvider implementation */;
//
//     for domain in provider.list_domains().await? {
//         let records = provider.list_records(&domain).await?;
//         println!("{}: {} records", domain.name, records.len());
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side identifier of a domain
///
/// Providers use integer or string ids; the core never inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainId {
    /// Numeric id
    Numeric(u64),
    /// Opaque string id
    Text(String),
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainId::Numeric(id) => write!(f, "{}", id),
            DomainId::Text(id) => f.write_str(id),
        }
    }
}

impl From<u64> for DomainId {
    fn from(id: u64) -> Self {
        DomainId::Numeric(id)
    }
}

impl From<&str> for DomainId {
    fn from(id: &str) -> Self {
        DomainId::Text(id.to_string())
    }
}

/// A DNS zone managed under the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Provider-side identifier
    pub id: DomainId,
    /// Display name (e.g. "example.com")
    pub name: String,
}

impl Domain {
    /// Create a new domain
    pub fn new(id: impl Into<DomainId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One DNS resource record within a domain
///
/// All attributes are kept as the provider's raw strings so that the
/// rendered table reflects exactly what the API returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Name of the owning domain
    pub domain: String,
    /// Raw enabled flag; `"1"` means enabled
    pub enabled: String,
    /// Record type (A, CNAME, MX, TXT, ...)
    pub record_type: String,
    /// Subdomain name ("@", "www", ...)
    pub name: String,
    /// Record value
    pub value: String,
    /// Time-to-live
    pub ttl: String,
    /// Last-updated timestamp as reported by the provider
    pub updated_at: String,
}

impl Record {
    /// Whether the provider reports this record as enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled == "1"
    }
}

/// Trait for DNS-hosting provider implementations
///
/// Implementations must handle the specifics of each provider's API and
/// map both transport failures and non-success application statuses to
/// [`crate::Error::Provider`], carrying the provider's message.
///
/// # Thread Safety
///
/// The record fetcher calls [`DomainProvider::list_records`] from one task
/// per domain, so implementations must be `Send + Sync`.
///
/// # Retries
///
/// Providers execute one API call per invocation and never retry. Retry
/// policy belongs to `SyncEngine`.
#[async_trait]
pub trait DomainProvider: Send + Sync {
    /// List every domain in the account
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Domain>)`: All domains
    /// - `Err(Error)`: Transport failure or non-success status
    async fn list_domains(&self) -> Result<Vec<Domain>, crate::Error>;

    /// List every record of one domain
    ///
    /// Returned records must carry `domain.name` in [`Record::domain`].
    ///
    /// # Parameters
    ///
    /// - `domain`: The domain to read
    async fn list_records(&self, domain: &Domain) -> Result<Vec<Record>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing domain providers from configuration
pub trait DomainProviderFactory: Send + Sync {
    /// Create a DomainProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DomainProvider>, crate::Error>;
}
