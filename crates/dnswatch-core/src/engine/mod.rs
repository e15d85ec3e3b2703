//! Sync engine
//!
//! The SyncEngine is responsible for:
//! - Reading the stored snapshot and rendering a fresh one concurrently
//! - Retrying the comparison until a difference can be trusted
//! - Producing the change report
//! - Persisting the new snapshot after a confirmed change
//!
//! ## Architecture
//!
//! ```text
//!                         ┌──────────────┐
//!                         │  SyncEngine  │
//!                         └──────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │ (concurrent)          │ (concurrent)          │
//!         ▼                       ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐       ┌─────────────┐
//! │ SnapshotStore │       │ RecordFetcher │       │   Events    │
//! │ (old text)    │       │ + render      │       │  (notify)   │
//! └───────────────┘       └───────────────┘       └─────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Fetch phase: read the old snapshot and render the new one
//! 2. Equal bytes: no changes, done
//! 3. Different bytes: retry from 1 until the confirm policy trusts it
//! 4. Diff, report, persist the new snapshot

use crate::config::{ConfirmPolicy, SyncConfig};
use crate::detector::{self, Comparison};
use crate::error::{Error, Result};
use crate::fetcher::RecordFetcher;
use crate::table;
use crate::traits::{DomainProvider, SnapshotStore, StoredSnapshot};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A fetch-and-compare attempt started
    AttemptStarted { attempt: usize, max_attempts: usize },

    /// Stored and rendered snapshots differed on this attempt
    SnapshotsDiffer { attempt: usize },

    /// Snapshots matched
    NoChanges { attempts: usize },

    /// A difference was trusted and diffed
    ChangeConfirmed {
        change_count: usize,
        attempts: usize,
    },

    /// The new snapshot was written to the store
    SnapshotPersisted { location: Option<String> },
}

/// Report of a confirmed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    /// Line-level comparison of old and new snapshots
    pub comparison: Comparison,
    /// The stored snapshot the new one was compared against
    pub old_snapshot: String,
    /// The freshly rendered snapshot
    pub new_snapshot: String,
}

impl ChangeReport {
    /// Number of change units
    pub fn change_count(&self) -> usize {
        self.comparison.change_count()
    }

    /// Human-readable diff body
    pub fn diff_text(&self) -> String {
        self.comparison.diff_text()
    }

    /// Headline plus trimmed diff body
    pub fn summary(&self) -> String {
        format!(
            "found {} changes to the DNS table:\n\n{}",
            self.change_count(),
            self.diff_text().trim()
        )
    }
}

/// Result of one sync cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored and rendered snapshots are identical
    NoChanges { attempts: usize },

    /// A change was confirmed
    Changed {
        report: ChangeReport,
        /// Where the snapshot lives, when the store can tell
        location: Option<String>,
        /// Whether the new snapshot was written (false on dry run)
        persisted: bool,
        attempts: usize,
    },
}

impl SyncOutcome {
    /// Whether a change was confirmed
    pub fn is_changed(&self) -> bool {
        matches!(self, SyncOutcome::Changed { .. })
    }

    /// Number of fetch-and-compare attempts used
    pub fn attempts(&self) -> usize {
        match self {
            SyncOutcome::NoChanges { attempts } | SyncOutcome::Changed { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Snapshot sync engine
///
/// One call to [`SyncEngine::run_once()`] is one complete cycle. The engine
/// holds no state between cycles, so it can be run repeatedly.
///
/// ## Failure Model
///
/// - A failing domain is skipped by the fetcher and never fails the cycle
/// - Store reads and writes get `store_max_attempts` tries with no delay
/// - Any other failure aborts the cycle and nothing is written
pub struct SyncEngine {
    /// Record fetcher over the domain provider
    fetcher: RecordFetcher,

    /// Store holding the last-known-good snapshot
    store: Box<dyn SnapshotStore>,

    /// Cycle settings
    config: SyncConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `provider`: Domain provider implementation
    /// - `store`: Snapshot store implementation
    /// - `config`: Sync settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields sync events
    pub fn new(
        provider: Arc<dyn DomainProvider>,
        store: Box<dyn SnapshotStore>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let fetcher = RecordFetcher::new(provider).with_max_concurrent(config.max_concurrent_domains);

        let engine = Self {
            fetcher,
            store,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run one sync cycle
    ///
    /// # Returns
    ///
    /// - `Ok(SyncOutcome)`: No changes, or a confirmed change
    /// - `Err(Error)`: Fetch phase or persistence failed, or the snapshot
    ///   never stabilized under `consecutive_match`
    pub async fn run_once(&self) -> Result<SyncOutcome> {
        let max_attempts = self.config.max_attempts;
        let mut previous_new: Option<String> = None;

        for attempt in 1..=max_attempts {
            self.emit_event(SyncEvent::AttemptStarted {
                attempt,
                max_attempts,
            });

            let (old, new) = self.fetch_phase().await?;

            if old.text == new {
                info!("No changes to the DNS table (attempt {}/{})", attempt, max_attempts);
                self.emit_event(SyncEvent::NoChanges { attempts: attempt });
                return Ok(SyncOutcome::NoChanges { attempts: attempt });
            }

            self.emit_event(SyncEvent::SnapshotsDiffer { attempt });

            let confirmed = match self.config.confirm_policy {
                ConfirmPolicy::LastAttempt => attempt == max_attempts,
                ConfirmPolicy::ConsecutiveMatch => previous_new.as_deref() == Some(new.as_str()),
            };

            if confirmed {
                return self.confirm(old, new, attempt).await;
            }

            if attempt < max_attempts {
                debug!(
                    "Snapshots differ on attempt {}/{}, retrying in {}s",
                    attempt, max_attempts, self.config.retry_delay_secs
                );
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
            }

            previous_new = Some(new);
        }

        Err(Error::unstable(format!(
            "rendered snapshot changed on every one of {} attempts",
            max_attempts
        )))
    }

    /// Read the old snapshot and render the new one concurrently
    async fn fetch_phase(&self) -> Result<(StoredSnapshot, String)> {
        let (old, new) = tokio::join!(self.read_snapshot(), self.render_snapshot());
        Ok((old?, new?))
    }

    async fn read_snapshot(&self) -> Result<StoredSnapshot> {
        self.with_store_retry("read", || self.store.read()).await
    }

    async fn render_snapshot(&self) -> Result<String> {
        let set = self.fetcher.fetch_all().await?;
        debug!("Rendering {} records", set.len());
        Ok(table::render_records(set.into_records()))
    }

    /// Diff, report and persist a trusted difference
    async fn confirm(&self, old: StoredSnapshot, new: String, attempts: usize) -> Result<SyncOutcome> {
        let comparison = detector::compare(&old.text, &new);
        let change_count = comparison.change_count();

        info!("Found {} changes to the DNS table", change_count);
        self.emit_event(SyncEvent::ChangeConfirmed {
            change_count,
            attempts,
        });

        let (location, persisted) = if self.config.dry_run {
            info!("Dry run, new snapshot not persisted");
            (old.location.clone(), false)
        } else {
            let written = self
                .with_store_retry("write", || self.store.write(&new))
                .await?;
            let location = written.or_else(|| old.location.clone());

            info!(
                "Persisted new snapshot to {}",
                location.as_deref().unwrap_or(self.store.store_name())
            );
            self.emit_event(SyncEvent::SnapshotPersisted {
                location: location.clone(),
            });
            (location, true)
        };

        Ok(SyncOutcome::Changed {
            report: ChangeReport {
                comparison,
                old_snapshot: old.text,
                new_snapshot: new,
            },
            location,
            persisted,
            attempts,
        })
    }

    /// Run a store operation with the store retry budget
    async fn with_store_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.store_max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Snapshot {} attempt {}/{} failed on {}: {}",
                        operation,
                        attempt,
                        max_attempts,
                        self.store.store_name(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let message = match last_error {
            Some(Error::Store { message, .. }) => message,
            Some(other) => other.to_string(),
            None => "no attempt made".to_string(),
        };

        Err(Error::store(
            self.store.store_name(),
            format!("{} failed after {} attempts: {}", operation, max_attempts, message),
        ))
    }

    /// Emit a sync event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
