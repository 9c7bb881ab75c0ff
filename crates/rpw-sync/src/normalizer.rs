//! Shapes remote records to the live local schema.
//!
//! Fields the local table does not have are dropped so new upstream fields
//! never break a write.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use rpw_db::LocalStore;
use rpw_schemas::{FieldValue, Record, Table};

/// Mis-encoded hyphen that upstream emits inside `status` values.
pub const MISENCODED_DASH: &str = "â€\u{90}";

pub fn repair_status(record: &mut Record) {
    if let Some(FieldValue::Text(status)) = record.get_mut("status") {
        if status.contains(MISENCODED_DASH) {
            *status = status.replace(MISENCODED_DASH, "-");
        }
    }
}

pub fn filter_columns(record: &Record, columns: &BTreeSet<String>) -> Record {
    record
        .iter()
        .filter(|(k, _)| columns.contains(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Column-set cache plus the normalize step. One per engine instance.
#[derive(Debug, Default)]
pub struct Normalizer {
    columns: BTreeMap<Table, BTreeSet<String>>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn columns(
        &mut self,
        store: &dyn LocalStore,
        table: Table,
    ) -> Result<&BTreeSet<String>> {
        Ok(match self.columns.entry(table) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => v.insert(store.columns(table).await?),
        })
    }

    pub async fn normalize(
        &mut self,
        store: &dyn LocalStore,
        table: Table,
        raw: &Record,
    ) -> Result<Record> {
        let mut repaired = raw.clone();
        repair_status(&mut repaired);
        let columns = self.columns(store, table).await?;
        Ok(filter_columns(&repaired, columns))
    }
}
