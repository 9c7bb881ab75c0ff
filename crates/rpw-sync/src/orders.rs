//! Order diff keyed by transaction hash.
//!
//! Pure logic: the engine fetches both sides, this module decides what to
//! write. Nothing is ever deleted.

use std::collections::{BTreeMap, BTreeSet};

use rpw_schemas::{FieldValue, OrderSides, Record};

/// Remote orders indexed by `tx_hash`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteOrders {
    pub by_hash: BTreeMap<String, Record>,
    /// Records without a usable `tx_hash`.
    pub missing_hash: usize,
}

/// Index both sides. A hash present on both sides keeps its give-side record.
pub fn index_remote(remote: &OrderSides<Record>) -> RemoteOrders {
    let mut out = RemoteOrders::default();
    for (_, order) in remote.iter() {
        match order.get("tx_hash").and_then(FieldValue::as_text) {
            Some(hash) if !hash.is_empty() => {
                out.by_hash
                    .entry(hash.to_string())
                    .or_insert_with(|| order.clone());
            }
            _ => out.missing_hash += 1,
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPlan {
    /// Known locally and present remotely: overwrite.
    pub refresh: Vec<String>,
    /// Present remotely only: create.
    pub create: Vec<String>,
    /// Known locally only: left untouched.
    pub local_only: Vec<String>,
}

/// All three lists are in ascending hash order.
pub fn plan_orders(local: &OrderSides<String>, remote: &RemoteOrders) -> OrderPlan {
    let local: BTreeSet<&str> = local.iter().map(|(_, h)| h.as_str()).collect();

    let mut plan = OrderPlan::default();
    for hash in &local {
        if remote.by_hash.contains_key(*hash) {
            plan.refresh.push(hash.to_string());
        } else {
            plan.local_only.push(hash.to_string());
        }
    }
    plan.create = remote
        .by_hash
        .keys()
        .filter(|h| !local.contains(h.as_str()))
        .cloned()
        .collect();
    plan
}
