use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use rpw_db::{LocalStore, OnConflict};
use rpw_schemas::{Condition, FieldValue, OrderSides, Record, Table};

fn default_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Assets => &[
            "asset",
            "asset_id",
            "asset_longname",
            "description",
            "divisible",
            "locked",
            "issuer",
            "owner",
            "supply",
            "real_supply",
            "image_file_name",
            "rarepepedirectory_url",
            "series",
        ],
        Table::Holdings => &["asset", "address", "address_quantity", "escrow"],
        Table::Dispensers => &[
            "tx_index",
            "tx_hash",
            "block_index",
            "source",
            "asset",
            "give_quantity",
            "escrow_quantity",
            "satoshirate",
            "give_remaining",
            "status",
            "oracle_address",
            "origin",
            "timestamp",
        ],
        Table::Orders => &[
            "tx_hash",
            "tx_index",
            "block_index",
            "source",
            "give_asset",
            "give_quantity",
            "give_remaining",
            "get_asset",
            "get_quantity",
            "get_remaining",
            "expiration",
            "expire_index",
            "fee_required",
            "fee_provided",
            "status",
            "timestamp",
        ],
        Table::Addresses => &["address", "is_burn"],
    }
}

/// Unique key enforced on insert, mirroring the baseline schema.
fn natural_key(table: Table) -> &'static [&'static str] {
    match table {
        Table::Assets => &["asset"],
        Table::Holdings => &["asset", "address"],
        Table::Dispensers => &["tx_index"],
        Table::Orders => &["tx_hash"],
        Table::Addresses => &["address"],
    }
}

/// Comparison key matching how the SQL literal renderer sees a value.
fn literal_key(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => String::new(),
        FieldValue::Bool(true) => "1".to_string(),
        FieldValue::Bool(false) => "0".to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(s) => s.clone(),
    }
}

fn field_matches(row: &Record, c: &Condition) -> bool {
    let stored = row.get(&c.field).unwrap_or(&FieldValue::Null);
    literal_key(stored) == literal_key(&c.value)
}

fn text_of<'a>(row: &'a Record, field: &str) -> Option<&'a str> {
    row.get(field).and_then(FieldValue::as_text)
}

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<Table, Vec<Record>>,
    columns: BTreeMap<Table, BTreeSet<String>>,
    inserts: BTreeMap<Table, usize>,
    updates: BTreeMap<Table, usize>,
    column_lookups: usize,
    failing: BTreeSet<Table>,
}

/// [`LocalStore`] backed by in-process maps.
///
/// Enforces natural-key uniqueness and rejects unknown columns, like the
/// Postgres schema does.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut state = State::default();
        for table in Table::ALL {
            state.columns.insert(
                table,
                default_columns(table).iter().map(|c| c.to_string()).collect(),
            );
        }
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replace the column set reported for `table`.
    pub fn with_columns(self, table: Table, columns: &[&str]) -> Self {
        self.state()
            .columns
            .insert(table, columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Put a row in place without going through the upsert counters.
    pub fn seed(&self, table: Table, row: Record) {
        self.state().rows.entry(table).or_default().push(row);
    }

    /// Every write to `table` fails from now on.
    pub fn fail_writes_to(&self, table: Table) {
        self.state().failing.insert(table);
    }

    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.state().rows.get(&table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: Table) -> usize {
        self.state().rows.get(&table).map_or(0, Vec::len)
    }

    pub fn find(&self, table: Table, conditions: &[Condition]) -> Option<Record> {
        self.state()
            .rows
            .get(&table)?
            .iter()
            .find(|r| conditions.iter().all(|c| field_matches(r, c)))
            .cloned()
    }

    pub fn insert_count(&self, table: Table) -> usize {
        self.state().inserts.get(&table).copied().unwrap_or(0)
    }

    pub fn update_count(&self, table: Table) -> usize {
        self.state().updates.get(&table).copied().unwrap_or(0)
    }

    /// Number of `columns` calls served.
    pub fn column_lookups(&self) -> usize {
        self.state().column_lookups
    }
}

fn check_columns(state: &State, table: Table, record: &Record) -> Result<()> {
    let known = state.columns.get(&table);
    for field in record.keys() {
        if !known.is_some_and(|cols| cols.contains(field)) {
            bail!("column \"{field}\" of relation \"{table}\" does not exist");
        }
    }
    Ok(())
}

fn check_writable(state: &State, table: Table) -> Result<()> {
    if state.failing.contains(&table) {
        bail!("query failed: writes to {table} are disabled");
    }
    Ok(())
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn columns(&self, table: Table) -> Result<BTreeSet<String>> {
        let mut st = self.state();
        st.column_lookups += 1;
        Ok(st.columns.get(&table).cloned().unwrap_or_default())
    }

    async fn exists(&self, table: Table, conditions: &[Condition]) -> Result<bool> {
        if conditions.is_empty() {
            bail!("refusing to build an unconditional WHERE clause");
        }
        Ok(self.find(table, conditions).is_some())
    }

    async fn insert(&self, table: Table, record: &Record, on_conflict: OnConflict) -> Result<u64> {
        if record.is_empty() {
            bail!("nothing to insert into {table}: record has no known columns");
        }
        let mut st = self.state();
        check_writable(&st, table)?;
        check_columns(&st, table, record)?;

        let key: Vec<Condition> = natural_key(table)
            .iter()
            .map(|k| Condition::eq(*k, record.get(*k).cloned().unwrap_or(FieldValue::Null)))
            .collect();
        let duplicate = st
            .rows
            .get(&table)
            .is_some_and(|rows| rows.iter().any(|r| key.iter().all(|c| field_matches(r, c))));
        if duplicate {
            return match on_conflict {
                OnConflict::DoNothing(_) => Ok(0),
                OnConflict::Error => {
                    bail!("duplicate key value violates unique constraint on {table}")
                }
            };
        }

        st.rows.entry(table).or_default().push(record.clone());
        *st.inserts.entry(table).or_default() += 1;
        Ok(1)
    }

    async fn update(&self, table: Table, record: &Record, conditions: &[Condition]) -> Result<u64> {
        if conditions.is_empty() {
            bail!("refusing to build an unconditional WHERE clause");
        }
        let mut st = self.state();
        check_writable(&st, table)?;
        check_columns(&st, table, record)?;

        let mut touched = 0;
        if let Some(rows) = st.rows.get_mut(&table) {
            for row in rows
                .iter_mut()
                .filter(|r| conditions.iter().all(|c| field_matches(r, c)))
            {
                for (k, v) in record {
                    row.insert(k.clone(), v.clone());
                }
                touched += 1;
            }
        }
        *st.updates.entry(table).or_default() += touched as usize;
        Ok(touched)
    }

    async fn derived_supply(&self, asset: &str) -> Result<i64> {
        let st = self.state();
        let burns: BTreeSet<&str> = st
            .rows
            .get(&Table::Addresses)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.get("is_burn").is_some_and(|v| literal_key(v) == "1"))
                    .filter_map(|r| text_of(r, "address"))
                    .collect()
            })
            .unwrap_or_default();

        let total = st
            .rows
            .get(&Table::Holdings)
            .map(|rows| {
                rows.iter()
                    .filter(|r| text_of(r, "asset") == Some(asset))
                    .filter(|r| text_of(r, "address").is_some_and(|a| !burns.contains(a)))
                    .filter_map(|r| r.get("address_quantity").and_then(FieldValue::as_i64))
                    .sum()
            })
            .unwrap_or(0);
        Ok(total)
    }

    async fn order_hashes(&self, asset: &str, base: Option<&str>) -> Result<OrderSides<String>> {
        let st = self.state();
        let mut sides = OrderSides::default();
        for row in st.rows.get(&Table::Orders).into_iter().flatten() {
            let Some(hash) = text_of(row, "tx_hash") else {
                continue;
            };
            let give = text_of(row, "give_asset");
            let get = text_of(row, "get_asset");
            if give == Some(asset) && base.map_or(true, |b| get == Some(b)) {
                sides.give.push(hash.to_string());
            }
            if get == Some(asset) && base.map_or(true, |b| give == Some(b)) {
                sides.get.push(hash.to_string());
            }
        }
        sides.give.sort();
        sides.get.sort();
        Ok(sides)
    }

    async fn dispenser_sources(&self) -> Result<Vec<String>> {
        let st = self.state();
        let sources: BTreeSet<String> = st
            .rows
            .get(&Table::Dispensers)
            .into_iter()
            .flatten()
            .filter_map(|r| text_of(r, "source"))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok(sources.into_iter().collect())
    }
}
