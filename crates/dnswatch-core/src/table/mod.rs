//! Canonical table rendering
//!
//! Turns a [`RecordSet`] into the fixed-width text that is stored as a
//! snapshot and compared line by line. Rendering is pure: the same records,
//! in any order, always produce the same bytes.

use crate::traits::Record;
use std::cmp::Ordering;

/// Header cells, in column order
const HEADER: [&str; 7] = [
    "Enabled",
    "Updated At",
    "TTL",
    "Type",
    "Domain",
    "Name",
    "Value",
];

/// Records gathered from every domain during one fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the records of one domain
    pub fn extend(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sort into canonical order
    pub fn sort(&mut self) {
        self.records.sort_by(canonical_order);
    }

    /// Borrow the records in their current order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the set
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Canonical total order: Type, Domain, Name, Value, UpdatedAt
///
/// Every key compares byte-wise and ascending.
pub fn canonical_order(a: &Record, b: &Record) -> Ordering {
    a.record_type
        .cmp(&b.record_type)
        .then_with(|| a.domain.cmp(&b.domain))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.value.cmp(&b.value))
        .then_with(|| a.updated_at.cmp(&b.updated_at))
}

/// Map the provider's raw enabled flag to its table cell
pub fn enabled_cell(raw: &str) -> &'static str {
    if raw == "1" { "Yes" } else { "No" }
}

fn push_line(out: &mut String, cells: [&str; 7]) {
    let [enabled, updated_at, ttl, record_type, domain, name, value] = cells;
    out.push_str(&format!(
        "{:<8}  {:<20}  {:<5}  {:<6}  {:<20}  {:<15}  {}\n",
        enabled, updated_at, ttl, record_type, domain, name, value
    ));
}

/// Render a record set into the canonical table text
///
/// The set is copied and sorted first, so the caller's order is irrelevant.
pub fn render(set: &RecordSet) -> String {
    let mut sorted = set.clone();
    sorted.sort();
    render_sorted(sorted.records())
}

/// Render an owned list of records, sorting in place
pub fn render_records(records: Vec<Record>) -> String {
    let mut set = RecordSet::from(records);
    set.sort();
    render_sorted(set.records())
}

fn render_sorted(records: &[Record]) -> String {
    let mut out = String::new();
    push_line(&mut out, HEADER);

    for record in records {
        push_line(
            &mut out,
            [
                enabled_cell(&record.enabled),
                &record.updated_at,
                &record.ttl,
                &record.record_type,
                &record.domain,
                &record.name,
                &record.value,
            ],
        );
    }

    out
}
