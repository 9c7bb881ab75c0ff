//! Per-address holder aggregation.
//!
//! Upstream returns one row per balance entry, so an address can appear many
//! times. Each quantity is truncated toward zero to an integer, then summed
//! per address. Parsing is done on the decimal text, never through floats;
//! JSON floats are read back from their shortest text form, which may carry
//! an exponent (`1e-8`, `2.5e+16`).

use std::collections::BTreeMap;
use std::fmt;

use rpw_schemas::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    Empty,
    Invalid(String),
    Overflow(String),
}

impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityError::Empty => write!(f, "quantity is empty"),
            QuantityError::Invalid(raw) => write!(f, "quantity is not a decimal number: '{raw}'"),
            QuantityError::Overflow(raw) => write!(f, "quantity does not fit in i64: '{raw}'"),
        }
    }
}

impl std::error::Error for QuantityError {}

/// Truncate a decimal string toward zero.
///
/// Accepts an optional sign, integer digits, an optional fractional part and
/// an optional exponent (`"10"`, `"10.75"`, `"-0.5"`, `".5"`, `"2.5e+16"`).
pub fn truncate_decimal(s: &str) -> Result<i64, QuantityError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }
    let invalid = || QuantityError::Invalid(s.to_string());
    let overflow = || QuantityError::Overflow(s.to_string());

    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().map_err(|_| invalid())?),
        None => (body, 0),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };

    let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !digits_only(int_part) || !digits_only(frac_part) {
        return Err(invalid());
    }

    // Position of the decimal point within int_part ++ frac_part.
    let point = int_part.len() as i64 + i64::from(exponent);
    let digits = int_part.bytes().chain(frac_part.bytes());
    let total = (int_part.len() + frac_part.len()) as i64;

    let mut value: i64 = 0;
    for b in digits.take(point.clamp(0, total) as usize) {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(b - b'0')))
            .ok_or_else(overflow)?;
    }
    if value != 0 {
        for _ in total..point {
            value = value.checked_mul(10).ok_or_else(overflow)?;
        }
    }
    Ok(if negative { -value } else { value })
}

pub fn truncate_quantity(v: &FieldValue) -> Result<i64, QuantityError> {
    match v {
        FieldValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None if n.is_u64() => Err(QuantityError::Overflow(n.to_string())),
            None => truncate_decimal(&n.to_string()),
        },
        FieldValue::Text(s) => truncate_decimal(s),
        FieldValue::Null => Err(QuantityError::Empty),
        FieldValue::Bool(b) => Err(QuantityError::Invalid(b.to_string())),
    }
}

/// A holder row that could not be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedHolding {
    pub address: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderTotals {
    /// address -> summed integer quantity
    pub totals: BTreeMap<String, i64>,
    pub skipped: Vec<SkippedHolding>,
}

pub fn aggregate_holdings(rows: &[Record]) -> HolderTotals {
    let mut out = HolderTotals::default();
    for row in rows {
        let Some(address) = row.get("address").and_then(FieldValue::as_text) else {
            out.skipped.push(SkippedHolding {
                address: None,
                reason: "missing address".to_string(),
            });
            continue;
        };

        let qty = row
            .get("address_quantity")
            .unwrap_or(&FieldValue::Null);
        let qty = match truncate_quantity(qty) {
            Ok(q) => q,
            Err(e) => {
                out.skipped.push(SkippedHolding {
                    address: Some(address.to_string()),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let slot = out.totals.entry(address.to_string()).or_insert(0);
        match slot.checked_add(qty) {
            Some(sum) => *slot = sum,
            None => out.skipped.push(SkippedHolding {
                address: Some(address.to_string()),
                reason: QuantityError::Overflow(qty.to_string()).to_string(),
            }),
        }
    }
    out
}
