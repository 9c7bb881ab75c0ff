//! Operator-provided input files: the asset catalog and the burn-address list.

use anyhow::{bail, Context, Result};
use rpw_schemas::CatalogEntry;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// The fixed, ordered asset catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build from entries; duplicate or blank asset names are rejected.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for e in &entries {
            if e.asset.trim().is_empty() {
                bail!("catalog entry with empty asset name");
            }
            if !seen.insert(e.asset.as_str()) {
                bail!("duplicate catalog asset: {}", e.asset);
            }
        }
        Ok(Self { entries })
    }

    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|n| CatalogEntry {
                    asset: n.into(),
                    image_file_name: None,
                    directory_url: None,
                    series: None,
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Asset names in catalog order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.asset.clone()).collect()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.get(asset).is_some()
    }

    pub fn get(&self, asset: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.asset == asset)
    }

    /// Names from `asset` (inclusive) to the end of the catalog.
    pub fn suffix_from(&self, asset: &str) -> Option<Vec<String>> {
        let idx = self.entries.iter().position(|e| e.asset == asset)?;
        Some(self.entries[idx..].iter().map(|e| e.asset.clone()).collect())
    }
}

pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read catalog failed: {}", path.display()))?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("catalog is not a JSON array of entries: {}", path.display()))?;
    Catalog::new(entries)
}

/// One address per line; surrounding whitespace and blank lines are ignored.
pub fn parse_burn_addresses(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn load_burn_addresses(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read burn address list failed: {}", path.display()))?;
    Ok(parse_burn_addresses(&raw))
}
