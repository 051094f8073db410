//! The renaming ledger: every resolved name mapping of one migration run.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::schema::ObjectKind;
use crate::error::{MigrateError, Result};

/// One resolved translation of a source name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamingRecord {
    /// Source schema the object belongs to.
    pub schema: String,
    pub kind: ObjectKind,
    pub old_name: String,
    pub new_name: String,

    /// Whether canonicalization did more than lowercase the name.
    pub normalized: bool,
}

type LedgerKey = (String, ObjectKind, String);

/// Append-only set of renaming records.
///
/// A `(schema, kind, old_name)` key maps to at most one new name. Records
/// iterate sorted by schema, then kind, then old name.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: BTreeMap<LedgerKey, RenamingRecord>,
    by_raw_name: HashMap<String, Vec<LedgerKey>>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one renaming event into the ledger.
    ///
    /// Returns `true` if the key was new. A repeated key with the same new
    /// name is ignored; a repeated key with a different new name fails with
    /// [`MigrateError::AmbiguousMapping`] and leaves the ledger unchanged.
    pub fn record(&mut self, event: RenamingRecord) -> Result<bool> {
        let key = (event.schema.clone(), event.kind, event.old_name.clone());

        if let Some(existing) = self.records.get(&key) {
            if existing.new_name == event.new_name {
                return Ok(false);
            }
            return Err(MigrateError::ambiguous(
                event.schema,
                Some(event.kind),
                event.old_name,
                existing.new_name.clone(),
                event.new_name,
            ));
        }

        self.by_raw_name
            .entry(event.old_name.to_lowercase())
            .or_default()
            .push(key.clone());
        self.records.insert(key, event);
        Ok(true)
    }

    /// Fold a sequence of events, stopping at the first ambiguity.
    pub fn record_all(&mut self, events: impl IntoIterator<Item = RenamingRecord>) -> Result<()> {
        for event in events {
            self.record(event)?;
        }
        Ok(())
    }

    /// Look up the record for an exact key.
    pub fn get(&self, schema: &str, kind: ObjectKind, old_name: &str) -> Option<&RenamingRecord> {
        self.records
            .get(&(schema.to_string(), kind, old_name.to_string()))
    }

    /// All records whose old name matches `raw`, ignoring case, across schemas and kinds.
    pub fn find_by_raw_name(&self, raw: &str) -> Vec<&RenamingRecord> {
        self.by_raw_name
            .get(&raw.to_lowercase())
            .map(|keys| keys.iter().filter_map(|k| self.records.get(k)).collect())
            .unwrap_or_default()
    }

    /// Iterate records sorted by schema, kind, old name.
    pub fn iter(&self) -> impl Iterator<Item = &RenamingRecord> {
        self.records.values()
    }

    /// Export the ledger as a sorted list.
    pub fn to_records(&self) -> Vec<RenamingRecord> {
        self.records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
