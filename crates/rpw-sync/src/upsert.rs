//! Create-or-update against a natural key.
//!
//! Existence check, then a full overwrite of the normalized fields or an
//! insert. There is no surrounding transaction; re-running converges.

use anyhow::{bail, Result};
use rpw_db::{LocalStore, OnConflict};
use rpw_schemas::{Condition, Record, Table};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::normalizer::Normalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// An insert was absorbed by `OnConflict::DoNothing`.
    Unchanged,
    /// The key matched but no remote field maps to a local column.
    Skipped,
}

pub async fn upsert(
    store: &dyn LocalStore,
    normalizer: &mut Normalizer,
    table: Table,
    key: &[Condition],
    raw: &Record,
    on_conflict: OnConflict,
) -> Result<UpsertOutcome> {
    let found = store.exists(table, key).await?;
    let record = normalizer.normalize(store, table, raw).await?;
    debug!(%table, ?key, ?record, found, "upsert");

    if found {
        if record.is_empty() {
            warn!(%table, ?key, "no known columns in remote record; update skipped");
            return Ok(UpsertOutcome::Skipped);
        }
        store.update(table, &record, key).await?;
        return Ok(UpsertOutcome::Updated);
    }

    if record.is_empty() {
        bail!("nothing to insert into {table} for {key:?}: no known columns");
    }
    match store.insert(table, &record, on_conflict).await? {
        0 => Ok(UpsertOutcome::Unchanged),
        _ => Ok(UpsertOutcome::Inserted),
    }
}
