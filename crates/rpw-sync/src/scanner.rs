use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rpw_config::Catalog;
use rpw_schemas::BlockRange;
use rpw_source::LedgerSource;
use tracing::{debug, info};

const PROGRESS_EVERY: u64 = 100;

/// Catalog assets touched by any block in `range`, sorted by name.
///
/// Any failure to read a block aborts the scan: a skipped block would let
/// the checkpoint move past changes that were never applied.
pub async fn scan_range(
    source: &dyn LedgerSource,
    range: BlockRange,
    catalog: &Catalog,
) -> Result<Vec<String>> {
    let mut touched = BTreeSet::new();
    if range.is_empty() {
        return Ok(Vec::new());
    }

    info!(%range, blocks = range.len(), "scanning blocks");
    for (i, block) in range.blocks().enumerate() {
        let assets = source
            .assets_in_block(block)
            .await
            .with_context(|| format!("block {block} could not be scanned"))?;
        debug!(block, ?assets, "block assets");
        touched.extend(assets.into_iter().filter(|a| catalog.contains(a)));

        let done = i as u64 + 1;
        if done % PROGRESS_EVERY == 0 {
            info!(block, done, total = range.len(), "scan progress");
        }
    }

    info!(%range, touched = touched.len(), "scan finished");
    Ok(touched.into_iter().collect())
}
