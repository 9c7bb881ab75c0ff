//! rpw-config
//!
//! Layered YAML configuration for the sync tooling.
//!
//! Layers are merged in order (earlier = base, later = override), canonicalized
//! to JSON and hashed so every run can log exactly which configuration it used.
//! The merged document is then deserialized into [`SyncConfig`], which is
//! built once at startup and passed by reference into constructors.
//!
//! Secrets never live in YAML: the config carries env var NAMES only
//! (see [`secrets`]).

pub mod catalog;
pub mod secrets;

use anyhow::{bail, Context, Result};
use rpw_schemas::{BlockNumber, GENESIS_BLOCK};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub use catalog::{load_burn_addresses, load_catalog, parse_burn_addresses, Catalog};
pub use secrets::{resolve_secrets, ResolvedSecrets};

/// Known secret-like prefixes. Any leaf string starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "postgres://",
    "postgresql://",
    "sk-",
    "AKIA",
    "-----BEGIN",
    "ghp_",
    "glpat-",
];

// ---------------------------------------------------------------------------
// Typed configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// NAME of the env var holding the Postgres URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "RPW_DATABASE_URL".to_string(),
            max_connections: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// API root, e.g. `https://xchain.io/api`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Retries after the first attempt for transport errors and HTTP 5xx.
    pub max_retries: u32,
    /// Linear backoff step between retries.
    pub retry_backoff_ms: u64,
    /// Page size for paginated list endpoints.
    pub page_size: u32,
    /// Upper bound on pages fetched for one list endpoint.
    pub max_pages: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://xchain.io/api".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 500,
            page_size: 500,
            max_pages: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Checkpoint file (single line, last synced block).
    pub state_file: PathBuf,
    /// JSON array of catalog entries.
    pub catalog_file: PathBuf,
    /// Newline-delimited burn addresses.
    pub burn_addresses_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("data/db_state.txt"),
            catalog_file: PathBuf::from("data/catalog.json"),
            burn_addresses_file: PathBuf::from("data/burn_addresses.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Seed value for a missing checkpoint file.
    pub genesis_block: BlockNumber,
    /// Asset -> base asset used to restrict the local order lookup.
    pub order_base_assets: BTreeMap<String, String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        let mut order_base_assets = BTreeMap::new();
        order_base_assets.insert("XCP".to_string(), "XCP".to_string());
        order_base_assets.insert("PEPECASH".to_string(), "XCP".to_string());
        Self {
            genesis_block: GENESIS_BLOCK,
            order_base_assets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    pub level: String,
    /// When set, logs are also written to a daily-rolling file here.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

/// Effective configuration for one process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    pub paths: PathsConfig,
    pub sync: SyncSettings,
    pub logging: LoggingConfig,
}

impl SyncConfig {
    /// Base asset for the local order lookup of `asset`, if any.
    pub fn order_base_asset(&self, asset: &str) -> Option<&str> {
        self.sync.order_base_assets.get(asset).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedSyncConfig {
    pub config: SyncConfig,
    pub config_hash: String,
    pub canonical_json: String,
}

/// Load and type the layered config. An empty path list yields defaults.
pub fn load_sync_config(paths: &[&str]) -> Result<LoadedSyncConfig> {
    let loaded = load_layered_yaml(paths)?;
    typed(loaded)
}

pub fn load_sync_config_from_strings(yaml_docs: &[&str]) -> Result<LoadedSyncConfig> {
    let loaded = load_layered_yaml_from_strings(yaml_docs)?;
    typed(loaded)
}

fn typed(loaded: LoadedConfig) -> Result<LoadedSyncConfig> {
    let config: SyncConfig = serde_json::from_value(loaded.config_json.clone())
        .context("config does not match the sync config schema")?;
    if config.source.page_size == 0 {
        bail!("CONFIG_INVALID: source.page_size must be > 0");
    }
    if config.source.max_pages == 0 {
        bail!("CONFIG_INVALID: source.max_pages must be > 0");
    }
    Ok(LoadedSyncConfig {
        config,
        config_hash: loaded.config_hash,
        canonical_json: loaded.canonical_json,
    })
}

// ---------------------------------------------------------------------------
// Layered YAML
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn collect_leaf_strings<'a>(v: &'a Value, prefix: &str, out: &mut Vec<(String, &'a str)>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                collect_leaf_strings(vv, &format!("{prefix}/{k}"), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_strings(vv, &format!("{prefix}/{i}"), out);
            }
        }
        Value::String(s) => out.push((prefix.to_string(), s.as_str())),
        _ => {}
    }
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_strings(v, "", &mut leaves);

    for (ptr, s) in leaves {
        if looks_like_secret(s) {
            bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_merge_overrides_leaves_and_keeps_siblings() {
        let a = serde_json::json!({"source": {"base_url": "a", "page_size": 10}});
        let b = serde_json::json!({"source": {"page_size": 20}});
        let m = deep_merge(a, b);
        assert_eq!(m.pointer("/source/base_url").unwrap(), "a");
        assert_eq!(m.pointer("/source/page_size").unwrap(), 20);
    }

    #[test]
    fn short_strings_are_never_secrets() {
        assert!(!looks_like_secret("sk-1"));
        assert!(looks_like_secret("postgres://u:p@h/db"));
    }
}
