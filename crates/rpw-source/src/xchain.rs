//! HTTP adapter for an xchain.io-style explorer API.
//!
//! Endpoints (relative to the configured base URL):
//! - `network`                        chain height
//! - `asset/{name}`                   asset object
//! - `holders/{name}/{page}/{limit}`  paged `{data, total}`
//! - `dispensers/{name}/{page}/{limit}`
//! - `orders/{name}/{page}/{limit}`
//! - `messages/{block}`               `{data: [{bindings}]}`
//!
//! Transport failures and 5xx responses are retried with linear backoff.
//! Decode failures are never retried.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use rpw_config::SourceConfig;
use rpw_schemas::{record_from_json, BlockNumber, OrderSides, Record};
use serde_json::Value;
use tracing::{debug, warn};

use crate::provider::{LedgerSource, SourceError};

/// Message binding keys that name an asset.
const ASSET_BINDING_KEYS: &[&str] = &["asset", "give_asset", "get_asset", "dividend_asset"];

#[derive(Debug, Clone)]
pub struct XChainSource {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
    page_size: u32,
    max_pages: u32,
}

impl XChainSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Self::new_with_base_url(cfg, cfg.base_url.clone())
    }

    /// Same as [`XChainSource::new`] with the base URL overridden (tests).
    pub fn new_with_base_url(cfg: &SourceConfig, base_url: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .context("http client build failed")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: cfg.max_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
            page_size: cfg.page_size.max(1),
            max_pages: cfg.max_pages.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json(&self, url: &str) -> Result<Value, SourceError> {
        let mut attempt: u32 = 0;
        loop {
            match self.get_json_once(url).await {
                Ok(v) => return Ok(v),
                Err(err) if attempt < self.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    warn!(url, attempt, error = %err, "retrying ledger request");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_json_once(&self, url: &str) -> Result<Value, SourceError> {
        debug!(url, "GET");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        serde_json::from_slice(&body)
            .map_err(|e| SourceError::MalformedResponse(format!("{url}: {e}")))
    }

    /// Walk a paged list endpoint until a short page or the reported total.
    ///
    /// A full page identical to the previous one, or more than `max_pages`
    /// pages, means the server is not paging: the list is reported as
    /// malformed rather than truncated or fetched forever.
    async fn paged(&self, kind: &str, asset: &str) -> Result<Vec<Record>, SourceError> {
        let limit = self.page_size as usize;
        let mut out = Vec::new();
        let mut previous: Option<Vec<Value>> = None;
        let mut page: u32 = 1;
        loop {
            if page > self.max_pages {
                return Err(SourceError::MalformedResponse(format!(
                    "{kind}/{asset}: more than {} pages of {limit}",
                    self.max_pages
                )));
            }
            let url = self.url(&format!("{kind}/{asset}/{page}/{limit}"));
            let body = self.get_json(&url).await?;

            let data = body
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| SourceError::MalformedResponse(format!("{url}: missing data array")))?;
            if !data.is_empty() && previous.as_ref() == Some(data) {
                return Err(SourceError::MalformedResponse(format!(
                    "{url}: page repeats the previous page"
                )));
            }
            for item in data {
                let rec = record_from_json(item).ok_or_else(|| {
                    SourceError::MalformedResponse(format!("{url}: list item is not an object"))
                })?;
                out.push(rec);
            }

            let total = body.get("total").and_then(value_as_u64);
            let reached_total = total.is_some_and(|t| out.len() as u64 >= t);
            if data.len() < limit || reached_total {
                return Ok(out);
            }
            previous = Some(data.clone());
            page += 1;
        }
    }
}

fn is_retryable(err: &SourceError) -> bool {
    match err {
        SourceError::Transport(_) => true,
        SourceError::Http { status, .. } => *status >= 500,
        _ => false,
    }
}

fn value_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Asset names carried by one message's bindings. Bindings may arrive as an
/// object or as a JSON-encoded string.
fn binding_assets(item: &Value, out: &mut BTreeSet<String>) -> Result<(), SourceError> {
    let parsed;
    let bindings = match item.get("bindings") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(raw)) => {
            parsed = serde_json::from_str::<Value>(raw)
                .map_err(|e| SourceError::MalformedResponse(format!("bindings: {e}")))?;
            &parsed
        }
        Some(other) => other,
    };
    let obj = bindings
        .as_object()
        .ok_or_else(|| SourceError::MalformedResponse("bindings is not an object".to_string()))?;

    for key in ASSET_BINDING_KEYS {
        if let Some(name) = obj.get(*key).and_then(Value::as_str) {
            if !name.is_empty() {
                out.insert(name.to_string());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl LedgerSource for XChainSource {
    fn source_name(&self) -> &'static str {
        "xchain"
    }

    async fn current_block(&self) -> Result<BlockNumber, SourceError> {
        let url = self.url("network");
        let body = self.get_json(&url).await?;
        body.pointer("/network_info/mainnet/block_height")
            .or_else(|| body.get("block_height"))
            .and_then(value_as_u64)
            .ok_or_else(|| SourceError::MalformedResponse(format!("{url}: no block height")))
    }

    async fn asset_details(&self, asset: &str) -> Result<Record, SourceError> {
        let url = self.url(&format!("asset/{asset}"));
        let body = self.get_json(&url).await?;
        if body.get("error").is_some() {
            return Err(SourceError::NotFound(format!("asset {asset}")));
        }
        record_from_json(&body)
            .ok_or_else(|| SourceError::MalformedResponse(format!("{url}: asset is not an object")))
    }

    async fn holdings(&self, asset: &str) -> Result<Vec<Record>, SourceError> {
        self.paged("holders", asset).await
    }

    async fn dispensers(&self, asset: &str) -> Result<Vec<Record>, SourceError> {
        self.paged("dispensers", asset).await
    }

    async fn orders(&self, asset: &str) -> Result<OrderSides<Record>, SourceError> {
        let all = self.paged("orders", asset).await?;
        let mut sides = OrderSides::default();
        for order in all {
            let leg = |k: &str| order.get(k).and_then(|v| v.as_text()) == Some(asset);
            let (gives, gets) = (leg("give_asset"), leg("get_asset"));
            if gives {
                sides.give.push(order);
            } else if gets {
                sides.get.push(order);
            } else {
                debug!(asset, "order references neither leg; ignored");
            }
        }
        Ok(sides)
    }

    async fn assets_in_block(&self, block: BlockNumber) -> Result<BTreeSet<String>, SourceError> {
        let url = self.url(&format!("messages/{block}"));
        let body = self.get_json(&url).await?;
        let data = body
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::MalformedResponse(format!("{url}: missing data array")))?;

        let mut out = BTreeSet::new();
        for item in data {
            binding_assets(item, &mut out)?;
        }
        Ok(out)
    }
}
