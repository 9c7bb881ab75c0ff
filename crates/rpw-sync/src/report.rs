use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rpw_schemas::{BlockNumber, Table};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::upsert::UpsertOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
    List,
    Start,
    Addresses,
    Initiate,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "sync",
            SyncMode::List => "list",
            SyncMode::Start => "start",
            SyncMode::Addresses => "addresses",
            SyncMode::Initiate => "initiate",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub inserted: u64,
    pub updated: u64,
    /// Inserts absorbed by a conflict tail plus updates with nothing to write.
    pub unchanged: u64,
}

/// Outcome of one engine run, serializable for the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    /// Ledger source the run read from.
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub assets_synced: Vec<String>,
    pub assets_skipped: Vec<String>,
    /// Steps and records skipped after a contained upstream failure.
    pub records_skipped: u64,
    pub tables: BTreeMap<Table, TableCounts>,
    pub checkpoint_before: Option<BlockNumber>,
    pub checkpoint_after: Option<BlockNumber>,
}

impl SyncReport {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            source: String::new(),
            started_at: Utc::now(),
            finished_at: None,
            assets_synced: Vec::new(),
            assets_skipped: Vec::new(),
            records_skipped: 0,
            tables: BTreeMap::new(),
            checkpoint_before: None,
            checkpoint_after: None,
        }
    }

    pub fn record(&mut self, table: Table, outcome: UpsertOutcome) {
        let counts = self.tables.entry(table).or_default();
        match outcome {
            UpsertOutcome::Inserted => counts.inserted += 1,
            UpsertOutcome::Updated => counts.updated += 1,
            UpsertOutcome::Unchanged | UpsertOutcome::Skipped => counts.unchanged += 1,
        }
    }

    pub fn inserted(&self, table: Table) -> u64 {
        self.tables.get(&table).map_or(0, |c| c.inserted)
    }

    pub fn updated(&self, table: Table) -> u64 {
        self.tables.get(&table).map_or(0, |c| c.updated)
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Flat `key=value` pairs for console output.
    pub fn key_values(&self) -> Vec<(String, String)> {
        let opt = |b: Option<BlockNumber>| b.map_or_else(|| "-".to_string(), |b| b.to_string());
        let mut out = vec![
            ("run_id".to_string(), self.run_id.to_string()),
            ("mode".to_string(), self.mode.to_string()),
            ("source".to_string(), self.source.clone()),
            ("assets_synced".to_string(), self.assets_synced.len().to_string()),
            ("assets_skipped".to_string(), self.assets_skipped.len().to_string()),
            ("records_skipped".to_string(), self.records_skipped.to_string()),
            ("checkpoint_before".to_string(), opt(self.checkpoint_before)),
            ("checkpoint_after".to_string(), opt(self.checkpoint_after)),
        ];
        for (table, c) in &self.tables {
            out.push((format!("{table}_inserted"), c.inserted.to_string()));
            out.push((format!("{table}_updated"), c.updated.to_string()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_table() {
        let mut r = SyncReport::new(SyncMode::List);
        r.record(Table::Holdings, UpsertOutcome::Inserted);
        r.record(Table::Holdings, UpsertOutcome::Inserted);
        r.record(Table::Holdings, UpsertOutcome::Updated);
        r.record(Table::Addresses, UpsertOutcome::Unchanged);
        assert_eq!(r.inserted(Table::Holdings), 2);
        assert_eq!(r.updated(Table::Holdings), 1);
        assert_eq!(r.inserted(Table::Addresses), 0);
    }

    #[test]
    fn serializes_with_table_names_as_keys() {
        let mut r = SyncReport::new(SyncMode::Incremental);
        r.record(Table::Orders, UpsertOutcome::Inserted);
        r.checkpoint_before = Some(1000);
        let v = serde_json::to_value(r.finish()).unwrap();
        assert_eq!(v["mode"], "incremental");
        assert_eq!(v["tables"]["orders"]["inserted"], 1);
        assert_eq!(v["checkpoint_before"], 1000);
        assert!(v["finished_at"].is_string());
    }

    #[test]
    fn key_values_mark_missing_checkpoints() {
        let r = SyncReport::new(SyncMode::Addresses);
        let kv = r.key_values();
        assert!(kv.contains(&("checkpoint_after".to_string(), "-".to_string())));
        assert!(kv.contains(&("mode".to_string(), "addresses".to_string())));
    }
}
