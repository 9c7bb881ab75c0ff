//! Reconciliation engine: converges the local store to the remote ledger.
//!
//! One asset is fully reconciled before the next starts. Per asset:
//! details, holders, dispensers, orders. Store failures abort the run and
//! leave the checkpoint where it was; undecodable upstream payloads are
//! logged and skip only the affected record or step.

use anyhow::{bail, Context, Result};
use rpw_config::{Catalog, SyncConfig};
use rpw_db::{LocalStore, OnConflict, ADDRESS_KEY};
use rpw_schemas::{BlockNumber, BlockRange, Condition, FieldValue, Record, Table};
use rpw_source::{LedgerSource, SourceError};
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{Advance, CheckpointStore};
use crate::holdings::aggregate_holdings;
use crate::normalizer::Normalizer;
use crate::orders::{index_remote, plan_orders};
use crate::report::{SyncMode, SyncReport};
use crate::scanner::scan_range;
use crate::upsert::{upsert, UpsertOutcome};

pub const DESCRIPTION_MAX_CHARS: usize = 250;

/// Cut `description` to [`DESCRIPTION_MAX_CHARS`] characters.
pub fn truncate_description(record: &mut Record) {
    if let Some(FieldValue::Text(d)) = record.get_mut("description") {
        if let Some((idx, _)) = d.char_indices().nth(DESCRIPTION_MAX_CHARS) {
            d.truncate(idx);
        }
    }
}

/// Turn a contained upstream failure into `None`; anything else is fatal.
fn contained<T>(res: Result<T, SourceError>, asset: &str, step: &str) -> Result<Option<T>> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_contained() => {
            warn!(asset, step, error = %e, "upstream data unusable; skipped");
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("{step} for {asset} failed"))),
    }
}

pub struct SyncEngine<'a> {
    store: &'a dyn LocalStore,
    source: &'a dyn LedgerSource,
    checkpoint: &'a CheckpointStore,
    catalog: &'a Catalog,
    config: &'a SyncConfig,
    normalizer: Normalizer,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        store: &'a dyn LocalStore,
        source: &'a dyn LedgerSource,
        checkpoint: &'a CheckpointStore,
        catalog: &'a Catalog,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            store,
            source,
            checkpoint,
            catalog,
            config,
            normalizer: Normalizer::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Modes
    // -----------------------------------------------------------------------

    /// Every catalog asset, then a catch-up pass over blocks produced while
    /// the first pass ran, then the checkpoint moves to the new height.
    #[instrument(skip(self), fields(source = self.source.source_name(), mode = "full"))]
    pub async fn full(&mut self) -> Result<SyncReport> {
        let mut report = self.new_report(SyncMode::Full);
        report.checkpoint_before = Some(self.checkpoint.read()?);

        let start_height = self.source.current_block().await?;
        info!(start_height, assets = self.catalog.len(), "full sync started");
        let names = self.catalog.names();
        self.sync_assets(&names, &mut report).await?;

        let new_height = self.source.current_block().await?;
        let catch_up = BlockRange::new(start_height, new_height);
        if !catch_up.is_empty() {
            info!(%catch_up, "catching up on blocks produced during the full pass");
            let touched = scan_range(self.source, catch_up, self.catalog).await?;
            self.sync_assets(&touched, &mut report).await?;
        }

        report.checkpoint_after = Some(self.advance_checkpoint(new_height.max(start_height))?);
        self.sync_addresses(&mut report).await?;
        Ok(report.finish())
    }

    /// Blocks since the checkpoint; only assets touched in them are synced.
    #[instrument(skip(self), fields(source = self.source.source_name(), mode = "sync"))]
    pub async fn incremental(&mut self) -> Result<SyncReport> {
        let mut report = self.new_report(SyncMode::Incremental);
        let last = self.checkpoint.read()?;
        report.checkpoint_before = Some(last);

        let current = self.source.current_block().await?;
        if current == last {
            info!(block = current, "already synced; nothing to do");
            report.checkpoint_after = Some(last);
            return Ok(report.finish());
        }
        if current < last {
            warn!(checkpoint = last, remote = current, "remote height is behind checkpoint; nothing to do");
            report.checkpoint_after = Some(last);
            return Ok(report.finish());
        }

        let touched = scan_range(self.source, BlockRange::new(last, current), self.catalog).await?;
        self.sync_assets(&touched, &mut report).await?;

        report.checkpoint_after = Some(self.advance_checkpoint(current)?);
        self.sync_addresses(&mut report).await?;
        Ok(report.finish())
    }

    /// Explicit asset list. The checkpoint is not touched.
    #[instrument(
        skip(self, names),
        fields(source = self.source.source_name(), mode = "list", count = names.len())
    )]
    pub async fn sync_list(&mut self, names: &[String]) -> Result<SyncReport> {
        let mut report = self.new_report(SyncMode::List);
        for name in names.iter().filter(|n| !self.catalog.contains(n)) {
            warn!(asset = %name, "asset is not in the catalog; syncing anyway");
        }
        self.sync_assets(names, &mut report).await?;
        self.sync_addresses(&mut report).await?;
        Ok(report.finish())
    }

    /// Catalog suffix starting at `name`. The checkpoint is not touched.
    #[instrument(skip(self), fields(source = self.source.source_name(), mode = "start"))]
    pub async fn sync_from(&mut self, name: &str) -> Result<SyncReport> {
        let Some(names) = self.catalog.suffix_from(name) else {
            bail!("unknown asset '{name}': not in the catalog");
        };
        let mut report = self.new_report(SyncMode::Start);
        self.sync_assets(&names, &mut report).await?;
        self.sync_addresses(&mut report).await?;
        Ok(report.finish())
    }

    /// Address pass on its own.
    #[instrument(skip(self), fields(source = self.source.source_name(), mode = "addresses"))]
    pub async fn addresses(&mut self) -> Result<SyncReport> {
        let mut report = self.new_report(SyncMode::Addresses);
        self.sync_addresses(&mut report).await?;
        Ok(report.finish())
    }

    /// First-time population: insert catalog assets not yet stored, then
    /// flag every burn address. Existing assets are left alone.
    ///
    /// The caller bootstraps the schema beforehand.
    #[instrument(
        skip(self, names, burn_addresses),
        fields(source = self.source.source_name(), mode = "initiate")
    )]
    pub async fn initiate(
        &mut self,
        names: Option<&[String]>,
        burn_addresses: &[String],
    ) -> Result<SyncReport> {
        let mut report = self.new_report(SyncMode::Initiate);
        let names = match names {
            Some(n) => n.to_vec(),
            None => self.catalog.names(),
        };

        for name in &names {
            let key = [Condition::eq("asset", name.as_str())];
            if self.store.exists(Table::Assets, &key).await? {
                info!(asset = %name, "already stored; skipped");
                continue;
            }
            let fetched = self.source.asset_details(name).await;
            let Some(mut details) = contained(fetched, name, "asset details")? else {
                report.assets_skipped.push(name.clone());
                continue;
            };

            truncate_description(&mut details);
            if let Some(supply) = details.get("supply").cloned() {
                details.insert("real_supply".to_string(), supply);
            }
            if let Some(entry) = self.catalog.get(name) {
                details.insert("image_file_name".into(), entry.image_file_name.clone().into());
                details.insert("rarepepedirectory_url".into(), entry.directory_url.clone().into());
                details.insert("series".into(), entry.series.clone().into());
            }

            let record = self.normalizer.normalize(self.store, Table::Assets, &details).await?;
            if record.is_empty() {
                bail!("nothing to insert into assets for {name}: no known columns");
            }
            info!(asset = %name, "inserting initial asset row");
            self.store
                .insert(Table::Assets, &record, OnConflict::Error)
                .await
                .with_context(|| format!("initial insert of {name} failed"))?;
            report.record(Table::Assets, UpsertOutcome::Inserted);
            report.assets_synced.push(name.clone());
        }

        info!(count = burn_addresses.len(), "updating known burn addresses");
        for address in burn_addresses {
            let key = [Condition::eq("address", address.as_str())];
            let mut rec = Record::new();
            rec.insert("address".into(), address.as_str().into());
            rec.insert("is_burn".into(), FieldValue::Bool(true));
            let outcome = upsert(
                self.store,
                &mut self.normalizer,
                Table::Addresses,
                &key,
                &rec,
                OnConflict::DoNothing(ADDRESS_KEY),
            )
            .await?;
            report.record(Table::Addresses, outcome);
        }

        Ok(report.finish())
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn new_report(&self, mode: SyncMode) -> SyncReport {
        let mut report = SyncReport::new(mode);
        report.source = self.source.source_name().to_string();
        report
    }

    fn advance_checkpoint(&self, block: BlockNumber) -> Result<BlockNumber> {
        match self.checkpoint.advance(block)? {
            Advance::Advanced { from, to } => {
                info!(from, to, "checkpoint advanced");
                Ok(to)
            }
            Advance::Unchanged(at) => Ok(at),
            Advance::Refused { current, requested } => {
                warn!(current, requested, "checkpoint would regress; kept");
                Ok(current)
            }
        }
    }

    async fn sync_assets(&mut self, names: &[String], report: &mut SyncReport) -> Result<()> {
        info!(count = names.len(), "syncing assets");
        for name in names {
            self.sync_asset(name, report).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, report))]
    async fn sync_asset(&mut self, asset: &str, report: &mut SyncReport) -> Result<()> {
        let fetched = self.source.asset_details(asset).await;
        let Some(details) = contained(fetched, asset, "asset details")? else {
            report.assets_skipped.push(asset.to_string());
            return Ok(());
        };
        self.sync_asset_row(asset, details, report).await?;
        self.sync_holders(asset, report).await?;
        self.sync_dispensers(asset, report).await?;
        self.sync_orders(asset, report).await?;
        report.assets_synced.push(asset.to_string());
        Ok(())
    }

    async fn sync_asset_row(
        &mut self,
        asset: &str,
        mut details: Record,
        report: &mut SyncReport,
    ) -> Result<()> {
        truncate_description(&mut details);
        let real_supply = self.store.derived_supply(asset).await?;
        details.insert("real_supply".to_string(), real_supply.into());
        details
            .entry("asset".to_string())
            .or_insert_with(|| asset.into());

        let key = [Condition::eq("asset", asset)];
        let outcome = upsert(
            self.store,
            &mut self.normalizer,
            Table::Assets,
            &key,
            &details,
            OnConflict::Error,
        )
        .await?;
        debug!(?outcome, real_supply, "asset row");
        report.record(Table::Assets, outcome);
        Ok(())
    }

    async fn sync_holders(&mut self, asset: &str, report: &mut SyncReport) -> Result<()> {
        let fetched = self.source.holdings(asset).await;
        let Some(rows) = contained(fetched, asset, "holders")? else {
            report.records_skipped += 1;
            return Ok(());
        };

        let agg = aggregate_holdings(&rows);
        for s in &agg.skipped {
            warn!(asset, address = ?s.address, reason = %s.reason, "holder row skipped");
        }
        report.records_skipped += agg.skipped.len() as u64;
        info!(asset, entries = rows.len(), addresses = agg.totals.len(), "holders aggregated");

        for (address, quantity) in agg.totals {
            let key = [
                Condition::eq("asset", asset),
                Condition::eq("address", address.as_str()),
            ];
            let mut rec = Record::new();
            rec.insert("asset".into(), asset.into());
            rec.insert("address".into(), address.into());
            rec.insert("address_quantity".into(), quantity.into());
            rec.insert("escrow".into(), FieldValue::Null);

            let outcome = upsert(
                self.store,
                &mut self.normalizer,
                Table::Holdings,
                &key,
                &rec,
                OnConflict::Error,
            )
            .await?;
            report.record(Table::Holdings, outcome);
        }
        Ok(())
    }

    async fn sync_dispensers(&mut self, asset: &str, report: &mut SyncReport) -> Result<()> {
        let fetched = self.source.dispensers(asset).await;
        let Some(rows) = contained(fetched, asset, "dispensers")? else {
            report.records_skipped += 1;
            return Ok(());
        };
        info!(asset, count = rows.len(), "dispensers fetched");

        for rec in rows {
            let Some(tx_index) = rec.get("tx_index").filter(|v| !v.is_null()).cloned() else {
                warn!(asset, "dispenser without tx_index skipped");
                report.records_skipped += 1;
                continue;
            };
            let key = [Condition::eq("tx_index", tx_index)];
            let outcome = upsert(
                self.store,
                &mut self.normalizer,
                Table::Dispensers,
                &key,
                &rec,
                OnConflict::Error,
            )
            .await?;
            report.record(Table::Dispensers, outcome);
        }
        Ok(())
    }

    async fn sync_orders(&mut self, asset: &str, report: &mut SyncReport) -> Result<()> {
        let base = self.config.order_base_asset(asset);
        let local = self.store.order_hashes(asset, base).await?;

        let fetched = self.source.orders(asset).await;
        let Some(remote) = contained(fetched, asset, "orders")? else {
            report.records_skipped += 1;
            return Ok(());
        };

        let remote = index_remote(&remote);
        if remote.missing_hash > 0 {
            warn!(asset, count = remote.missing_hash, "orders without tx_hash skipped");
            report.records_skipped += remote.missing_hash as u64;
        }
        let plan = plan_orders(&local, &remote);
        info!(
            asset,
            ?base,
            refresh = plan.refresh.len(),
            create = plan.create.len(),
            local_only = plan.local_only.len(),
            "order diff"
        );

        for hash in plan.refresh.iter().chain(plan.create.iter()) {
            let Some(rec) = remote.by_hash.get(hash) else {
                continue;
            };
            let key = [Condition::eq("tx_hash", hash.as_str())];
            let outcome = upsert(
                self.store,
                &mut self.normalizer,
                Table::Orders,
                &key,
                rec,
                OnConflict::Error,
            )
            .await?;
            report.record(Table::Orders, outcome);
        }
        Ok(())
    }

    async fn sync_addresses(&mut self, report: &mut SyncReport) -> Result<()> {
        let sources = self.store.dispenser_sources().await?;
        info!(count = sources.len(), "adding dispenser addresses");

        for address in sources {
            let key = [Condition::eq("address", address.as_str())];
            if self.store.exists(Table::Addresses, &key).await? {
                continue;
            }
            let mut rec = Record::new();
            rec.insert("address".into(), address.as_str().into());
            let rec = self
                .normalizer
                .normalize(self.store, Table::Addresses, &rec)
                .await?;
            let written = self
                .store
                .insert(Table::Addresses, &rec, OnConflict::DoNothing(ADDRESS_KEY))
                .await?;
            let outcome = if written == 0 {
                UpsertOutcome::Unchanged
            } else {
                UpsertOutcome::Inserted
            };
            debug!(%address, ?outcome, "address");
            report.record(Table::Addresses, outcome);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_truncates_on_char_boundary() {
        let mut r = Record::new();
        r.insert("description".into(), "é".repeat(300).into());
        truncate_description(&mut r);
        let d = r["description"].as_text().unwrap();
        assert_eq!(d.chars().count(), 250);
    }

    #[test]
    fn short_description_is_untouched() {
        let mut r = Record::new();
        r.insert("description".into(), "feels good man".into());
        truncate_description(&mut r);
        assert_eq!(r["description"], FieldValue::from("feels good man"));
    }
}
