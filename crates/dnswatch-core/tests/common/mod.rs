//! Test doubles and common utilities for sync contract tests
//!
//! The doubles count every call so tests can assert how often the engine
//! touched the provider and the store.

#![allow(dead_code)]

use dnswatch_core::config::SyncConfig;
use dnswatch_core::error::{Error, Result};
use dnswatch_core::traits::{Domain, DomainProvider, Record, SnapshotStore, StoredSnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Build an enabled record
pub fn record(record_type: &str, domain: &str, name: &str, value: &str, updated_at: &str) -> Record {
    Record {
        domain: domain.to_string(),
        enabled: "1".to_string(),
        record_type: record_type.to_string(),
        name: name.to_string(),
        value: value.to_string(),
        ttl: "600".to_string(),
        updated_at: updated_at.to_string(),
    }
}

/// Build an A record for the zone apex
pub fn a_record(domain: &str, value: &str, updated_at: &str) -> Record {
    record("A", domain, "@", value, updated_at)
}

/// Sync settings with no retry delay
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        retry_delay_secs: 0,
        ..SyncConfig::default()
    }
}

/// A provider that serves one record table per fetch cycle
///
/// Call N of `list_domains()` selects table N; the last table repeats once
/// the script runs out. Domains are derived from the table's records.
#[derive(Clone)]
pub struct ScriptedProvider {
    tables: Arc<Vec<Vec<Record>>>,
    /// Domains listed every cycle whose record fetch always fails
    failing_domains: Arc<Vec<String>>,
    /// Fail the domain list itself
    fail_domain_list: bool,
    cycle: Arc<AtomicUsize>,
    list_domains_calls: Arc<AtomicUsize>,
    list_records_calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(tables: Vec<Vec<Record>>) -> Self {
        Self {
            tables: Arc::new(tables),
            failing_domains: Arc::new(Vec::new()),
            fail_domain_list: false,
            cycle: Arc::new(AtomicUsize::new(0)),
            list_domains_calls: Arc::new(AtomicUsize::new(0)),
            list_records_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Serve the same table on every cycle
    pub fn fixed(records: Vec<Record>) -> Self {
        Self::new(vec![records])
    }

    pub fn with_failing_domains(mut self, domains: &[&str]) -> Self {
        self.failing_domains = Arc::new(domains.iter().map(|d| d.to_string()).collect());
        self
    }

    pub fn with_failing_domain_list(mut self) -> Self {
        self.fail_domain_list = true;
        self
    }

    /// Get the number of times list_domains() was called
    pub fn list_domains_calls(&self) -> usize {
        self.list_domains_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times list_records() was called
    pub fn list_records_calls(&self) -> usize {
        self.list_records_calls.load(Ordering::SeqCst)
    }

    fn current_table(&self) -> &[Record] {
        let cycle = self.cycle.load(Ordering::SeqCst);
        match self.tables.get(cycle).or_else(|| self.tables.last()) {
            Some(table) => table.as_slice(),
            None => &[],
        }
    }
}

#[async_trait::async_trait]
impl DomainProvider for ScriptedProvider {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let call = self.list_domains_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_domain_list {
            return Err(Error::provider("scripted", "domain list unavailable"));
        }
        self.cycle.store(call, Ordering::SeqCst);

        let mut names: Vec<String> = Vec::new();
        for record in self.current_table() {
            if !names.contains(&record.domain) {
                names.push(record.domain.clone());
            }
        }
        for failing in self.failing_domains.iter() {
            if !names.contains(failing) {
                names.push(failing.clone());
            }
        }

        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Domain::new(i as u64 + 1, name))
            .collect())
    }

    async fn list_records(&self, domain: &Domain) -> Result<Vec<Record>> {
        self.list_records_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_domains.contains(&domain.name) {
            return Err(Error::provider("scripted", format!("records of {} unavailable", domain.name)));
        }

        Ok(self
            .current_table()
            .iter()
            .filter(|r| r.domain == domain.name)
            .cloned()
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// A mock SnapshotStore that tracks calls and can be told to fail
#[derive(Clone)]
pub struct MockSnapshotStore {
    text: Arc<Mutex<String>>,
    location: Option<String>,
    read_calls: Arc<AtomicUsize>,
    write_calls: Arc<AtomicUsize>,
    /// Reads that fail before one succeeds
    read_failures: Arc<AtomicUsize>,
    /// Writes that fail before one succeeds
    write_failures: Arc<AtomicUsize>,
}

impl MockSnapshotStore {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::new(Mutex::new(text.into())),
            location: Some("https://gist.example/abc".to_string()),
            read_calls: Arc::new(AtomicUsize::new(0)),
            write_calls: Arc::new(AtomicUsize::new(0)),
            read_failures: Arc::new(AtomicUsize::new(0)),
            write_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_reads(self, count: usize) -> Self {
        self.read_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self, count: usize) -> Self {
        self.write_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Get the number of times read() was called
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times write() was called
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Current stored text
    pub fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    /// Location reported by the store
    pub fn location(&self) -> Option<String> {
        self.location.clone()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl SnapshotStore for MockSnapshotStore {
    async fn read(&self) -> Result<StoredSnapshot> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.read_failures) {
            return Err(Error::store("mock", "read refused"));
        }
        Ok(StoredSnapshot::new(self.text(), self.location.clone()))
    }

    async fn write(&self, text: &str) -> Result<Option<String>> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.write_failures) {
            return Err(Error::store("mock", "write refused"));
        }
        *self.text.lock().unwrap() = text.to_string();
        Ok(self.location.clone())
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

/// Drain every event currently buffered in the channel
pub fn drain_events<T>(rx: &mut tokio::sync::mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
