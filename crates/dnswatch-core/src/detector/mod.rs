//! Change detection between two snapshots
//!
//! [`compare`] checks byte equality first and only runs the line diff when
//! the snapshots differ. Every inserted or deleted hunk becomes one
//! [`DiffEntry`], numbered by the unchanged-context line counter.

use crate::diff::{self, Operation};
use std::fmt;

/// Kind of a change unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Lines only present in the new snapshot
    Added,
    /// Lines only present in the old snapshot
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("added"),
            ChangeKind::Deleted => f.write_str("deleted"),
        }
    }
}

/// One change unit of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// Inserted or deleted
    pub kind: ChangeKind,
    /// 1-based line number in unchanged-context numbering
    pub line: usize,
    /// Literal hunk text, trailing newlines included
    pub text: String,
}

impl fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} {}:\n{}\n", self.line, self.kind, self.text)
    }
}

/// Result of comparing an old snapshot with a new one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Whether the snapshots differ at all
    pub changed: bool,
    /// Change units in encounter order
    pub entries: Vec<DiffEntry>,
}

impl Comparison {
    /// Number of change units
    pub fn change_count(&self) -> usize {
        self.entries.len()
    }

    /// Human-readable diff body, one block per entry
    pub fn diff_text(&self) -> String {
        self.entries.iter().map(DiffEntry::to_string).collect()
    }
}

/// Compare two canonical snapshot texts
pub fn compare(old: &str, new: &str) -> Comparison {
    if old == new {
        return Comparison::default();
    }

    let mut entries = Vec::new();
    let mut line = 1;

    for hunk in diff::diff_lines(old, new) {
        let kind = match hunk.op {
            Operation::Equal => {
                line += hunk.newline_count();
                continue;
            }
            Operation::Insert => ChangeKind::Added,
            Operation::Delete => ChangeKind::Deleted,
        };

        entries.push(DiffEntry {
            kind,
            line,
            text: hunk.text(),
        });
    }

    Comparison {
        changed: true,
        entries,
    }
}
