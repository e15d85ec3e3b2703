//! Concurrent record fetch across every domain of an account
//!
//! ```text
//!                      list_domains()
//!                            │
//!        ┌───────────────────┼───────────────────┐
//!        ▼                   ▼                   ▼
//!  list_records(a)     list_records(b)     list_records(c)     (one task each)
//!        │                   │                   │
//!        └───────────────────┼───────────────────┘
//!                            ▼
//!                   join all (barrier)
//!                            │
//!                            ▼
//!                        RecordSet
//! ```
//!
//! A failing domain contributes no records. The failure is logged and kept
//! in the [`FetchReport`], but it never fails the cycle.

use crate::error::{Error, Result};
use crate::table::RecordSet;
use crate::traits::{Domain, DomainProvider, Record};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Result of fetching one domain's records
#[derive(Debug)]
pub struct DomainOutcome {
    /// The domain that was fetched
    pub domain: Domain,
    /// Its records, or the error that was swallowed
    pub result: Result<Vec<Record>>,
}

impl DomainOutcome {
    /// Whether the domain's records were fetched
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-domain outcomes of one fetch
#[derive(Debug, Default)]
pub struct FetchReport {
    /// One entry per domain, in completion order
    pub outcomes: Vec<DomainOutcome>,
}

impl FetchReport {
    /// Number of domains whose fetch failed
    pub fn failed_domains(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }

    /// Collect every fetched record, dropping failed domains
    pub fn into_record_set(self) -> RecordSet {
        let mut set = RecordSet::new();
        for outcome in self.outcomes {
            if let Ok(records) = outcome.result {
                set.extend(records);
            }
        }
        set
    }
}

/// Fetches domains and their records from a [`DomainProvider`]
#[derive(Clone)]
pub struct RecordFetcher {
    provider: Arc<dyn DomainProvider>,
    max_concurrent: Option<usize>,
}

impl RecordFetcher {
    /// Create a fetcher with unbounded per-domain fan-out
    pub fn new(provider: Arc<dyn DomainProvider>) -> Self {
        Self {
            provider,
            max_concurrent: None,
        }
    }

    /// Bound the number of domains fetched at the same time
    ///
    /// `None` (and `Some(0)`) mean unbounded.
    pub fn with_max_concurrent(mut self, max_concurrent: Option<usize>) -> Self {
        self.max_concurrent = max_concurrent.filter(|n| *n > 0);
        self
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Fetch every record of every domain
    ///
    /// # Returns
    ///
    /// - `Ok(RecordSet)`: Records of all domains that could be fetched
    /// - `Err(Error)`: If the domain list itself could not be fetched
    pub async fn fetch_all(&self) -> Result<RecordSet> {
        Ok(self.fetch_report().await?.into_record_set())
    }

    /// Fetch every domain and keep the per-domain outcomes
    pub async fn fetch_report(&self) -> Result<FetchReport> {
        let domains = self
            .provider
            .list_domains()
            .await
            .map_err(|e| provider_error(self.provider.as_ref(), e))?;
        debug!(
            "{} returned {} domains",
            self.provider.provider_name(),
            domains.len()
        );

        let semaphore = self.max_concurrent.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();

        for domain in domains {
            let provider = Arc::clone(&self.provider);
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                // Held until the task finishes
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };

                let result = provider.list_records(&domain).await;
                DomainOutcome { domain, result }
            });
        }

        let mut report = FetchReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    // The domain is unknown once its task is gone
                    warn!("Record fetch task failed: {}", e);
                    continue;
                }
            };

            match &outcome.result {
                Ok(records) => {
                    debug!("Fetched {} records for {}", records.len(), outcome.domain.name);
                }
                Err(e) => {
                    warn!(
                        "Skipping domain {} ({}): {}",
                        outcome.domain.name, outcome.domain.id, e
                    );
                }
            }

            report.outcomes.push(outcome);
        }

        if report.failed_domains() > 0 {
            debug!(
                "{} of {} domains failed to fetch",
                report.failed_domains(),
                report.outcomes.len()
            );
        }

        Ok(report)
    }
}

impl std::fmt::Debug for RecordFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFetcher")
            .field("provider", &self.provider.provider_name())
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

/// Wrap a provider-side failure so that it names the provider
pub(crate) fn provider_error(provider: &dyn DomainProvider, err: Error) -> Error {
    match err {
        Error::Provider { .. } => err,
        other => Error::provider(provider.provider_name(), other.to_string()),
    }
}
