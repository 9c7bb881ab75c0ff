//! rpw-schemas
//!
//! Shared value and record types used by the ledger source, the local store
//! and the sync engine. No IO lives here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Ledger block height.
pub type BlockNumber = u64;

/// First block with asset activity; seeds a missing checkpoint.
pub const GENESIS_BLOCK: BlockNumber = 278_270;

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A single remote field value, tagged by kind.
///
/// The source adapter produces these; store backends render them into their
/// own literal syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Convert a decoded JSON value. Arrays and objects are kept as their
    /// compact JSON text.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(*b),
            Value::Number(n) => FieldValue::Number(n.clone()),
            Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Integer view used for block heights and supplies.
    ///
    /// Accepts integral JSON numbers and base-10 integer strings.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => n.as_i64(),
            FieldValue::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Field name -> value. Ordered so generated statements are deterministic.
pub type Record = BTreeMap<String, FieldValue>;

/// Build a [`Record`] from a JSON object. Returns `None` for any other shape.
pub fn record_from_json(v: &Value) -> Option<Record> {
    let obj = v.as_object()?;
    Some(
        obj.iter()
            .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tables and match conditions
// ---------------------------------------------------------------------------

/// Tables the engine writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Assets,
    Holdings,
    Dispensers,
    Orders,
    Addresses,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Assets,
        Table::Holdings,
        Table::Dispensers,
        Table::Orders,
        Table::Addresses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Assets => "assets",
            Table::Holdings => "holdings",
            Table::Dispensers => "dispensers",
            Table::Orders => "orders",
            Table::Addresses => "addresses",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality condition `field = value` used for natural-key matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: FieldValue,
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Order book sides
// ---------------------------------------------------------------------------

/// Side of the order book an order was found on, relative to the asset queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Give,
    Get,
}

/// Orders split by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSides<T> {
    pub give: Vec<T>,
    pub get: Vec<T>,
}

impl<T> Default for OrderSides<T> {
    fn default() -> Self {
        Self {
            give: Vec::new(),
            get: Vec::new(),
        }
    }
}

impl<T> OrderSides<T> {
    pub fn len(&self) -> usize {
        self.give.len() + self.get.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate give side first, then get side.
    pub fn iter(&self) -> impl Iterator<Item = (OrderSide, &T)> {
        self.give
            .iter()
            .map(|o| (OrderSide::Give, o))
            .chain(self.get.iter().map(|o| (OrderSide::Get, o)))
    }
}

// ---------------------------------------------------------------------------
// Block ranges
// ---------------------------------------------------------------------------

/// Half-open block range `(after, through]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    /// Last block already incorporated (exclusive).
    pub after: BlockNumber,
    /// Last block to incorporate (inclusive).
    pub through: BlockNumber,
}

impl BlockRange {
    pub fn new(after: BlockNumber, through: BlockNumber) -> Self {
        Self { after, through }
    }

    pub fn is_empty(&self) -> bool {
        self.through <= self.after
    }

    pub fn len(&self) -> u64 {
        self.through.saturating_sub(self.after)
    }

    /// Blocks in ascending order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockNumber> {
        (self.after + 1)..=self.through
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.after, self.through)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// One tracked asset and the locally curated metadata that the ledger does not carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub asset: String,
    #[serde(default)]
    pub image_file_name: Option<String>,
    #[serde(default)]
    pub directory_url: Option<String>,
    #[serde(default)]
    pub series: Option<String>,
}
