use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rpw_schemas::{BlockNumber, FieldValue, OrderSide, OrderSides, Record};
use rpw_source::{LedgerSource, SourceError};

use crate::record;

/// Source call that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Endpoint {
    AssetDetails,
    Holdings,
    Dispensers,
    Orders,
    Block,
}

#[derive(Debug, Default)]
struct Calls {
    heights: VecDeque<BlockNumber>,
    log: Vec<String>,
}

/// [`LedgerSource`] that replays a fixed script.
///
/// `current_block` pops scripted heights in order; the last one repeats.
/// Unknown assets answer `NotFound`; unknown lists answer empty.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    assets: BTreeMap<String, Record>,
    holdings: BTreeMap<String, Vec<Record>>,
    dispensers: BTreeMap<String, Vec<Record>>,
    orders: BTreeMap<String, OrderSides<Record>>,
    blocks: BTreeMap<BlockNumber, BTreeSet<String>>,
    failures: BTreeMap<(Endpoint, String), SourceError>,
    calls: Mutex<Calls>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn calls(&self) -> MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn note(&self, what: String) {
        self.calls().log.push(what);
    }

    fn scripted_failure(&self, endpoint: Endpoint, key: &str) -> Result<(), SourceError> {
        match self.failures.get(&(endpoint, key.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn with_heights<I: IntoIterator<Item = BlockNumber>>(self, heights: I) -> Self {
        self.calls().heights = heights.into_iter().collect();
        self
    }

    /// Minimal asset object with the given supply.
    pub fn with_asset(self, asset: &str, supply: i64) -> Self {
        self.with_asset_record(record([
            ("asset", FieldValue::from(asset)),
            ("supply", FieldValue::from(supply)),
            ("divisible", FieldValue::Bool(false)),
        ]))
    }

    pub fn with_asset_record(mut self, rec: Record) -> Self {
        let name = rec
            .get("asset")
            .and_then(FieldValue::as_text)
            .unwrap_or_default()
            .to_string();
        self.assets.insert(name, rec);
        self
    }

    pub fn with_holding(mut self, asset: &str, address: &str, quantity: &str) -> Self {
        self.holdings.entry(asset.to_string()).or_default().push(record([
            ("asset", asset),
            ("address", address),
            ("address_quantity", quantity),
        ]));
        self
    }

    pub fn with_dispenser(mut self, asset: &str, rec: Record) -> Self {
        self.dispensers.entry(asset.to_string()).or_default().push(rec);
        self
    }

    pub fn with_order(mut self, asset: &str, side: OrderSide, rec: Record) -> Self {
        let sides = self.orders.entry(asset.to_string()).or_default();
        match side {
            OrderSide::Give => sides.give.push(rec),
            OrderSide::Get => sides.get.push(rec),
        }
        self
    }

    pub fn with_block(mut self, block: BlockNumber, assets: &[&str]) -> Self {
        self.blocks
            .entry(block)
            .or_default()
            .extend(assets.iter().map(|a| a.to_string()));
        self
    }

    /// `key` is the asset name, or the block number as text for [`Endpoint::Block`].
    pub fn with_failure(mut self, endpoint: Endpoint, key: &str, err: SourceError) -> Self {
        self.failures.insert((endpoint, key.to_string()), err);
        self
    }

    /// Calls served so far, as `"<endpoint> <key>"`.
    pub fn call_log(&self) -> Vec<String> {
        self.calls().log.clone()
    }

    /// Assets whose details were requested, in request order.
    pub fn assets_requested(&self) -> Vec<String> {
        self.calls()
            .log
            .iter()
            .filter_map(|c| c.strip_prefix("asset_details "))
            .map(str::to_string)
            .collect()
    }
}

#[async_trait]
impl LedgerSource for ScriptedSource {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    async fn current_block(&self) -> Result<BlockNumber, SourceError> {
        let mut calls = self.calls();
        calls.log.push("current_block".to_string());
        let height = match calls.heights.len() {
            0 => return Err(SourceError::Transport("no height scripted".to_string())),
            1 => calls.heights[0],
            _ => calls.heights.pop_front().unwrap_or_default(),
        };
        Ok(height)
    }

    async fn asset_details(&self, asset: &str) -> Result<Record, SourceError> {
        self.note(format!("asset_details {asset}"));
        self.scripted_failure(Endpoint::AssetDetails, asset)?;
        self.assets
            .get(asset)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("asset {asset}")))
    }

    async fn holdings(&self, asset: &str) -> Result<Vec<Record>, SourceError> {
        self.note(format!("holdings {asset}"));
        self.scripted_failure(Endpoint::Holdings, asset)?;
        Ok(self.holdings.get(asset).cloned().unwrap_or_default())
    }

    async fn dispensers(&self, asset: &str) -> Result<Vec<Record>, SourceError> {
        self.note(format!("dispensers {asset}"));
        self.scripted_failure(Endpoint::Dispensers, asset)?;
        Ok(self.dispensers.get(asset).cloned().unwrap_or_default())
    }

    async fn orders(&self, asset: &str) -> Result<OrderSides<Record>, SourceError> {
        self.note(format!("orders {asset}"));
        self.scripted_failure(Endpoint::Orders, asset)?;
        Ok(self.orders.get(asset).cloned().unwrap_or_default())
    }

    async fn assets_in_block(&self, block: BlockNumber) -> Result<BTreeSet<String>, SourceError> {
        self.note(format!("block {block}"));
        self.scripted_failure(Endpoint::Block, &block.to_string())?;
        Ok(self.blocks.get(&block).cloned().unwrap_or_default())
    }
}
