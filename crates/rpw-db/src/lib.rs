//! rpw-db
//!
//! Local store adapter. The sync engine talks to the store only through
//! [`LocalStore`]; [`PgStore`] is the Postgres implementation.
//!
//! Statements for the upsert protocol are built as text by [`sql`] (column
//! names are discovered at runtime, so they cannot be bound). The typed reads
//! use bound parameters.

pub mod sql;
mod store;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rpw_schemas::{Condition, OrderSides, Record, Table};
use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::{Connection, Executor};
use std::collections::BTreeSet;

pub use sql::OnConflict;
pub use sqlx::PgPool;
pub use store::PgStore;

pub const ENV_DB_URL: &str = "RPW_DATABASE_URL";

/// Baseline DDL. Every statement is `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA_SQL: &str = include_str!("../schema.sql");

/// Natural key of the addresses table, for insert-if-absent.
pub const ADDRESS_KEY: &[&str] = &["address"];

/// Session advisory lock key held for the duration of a sync run.
const RUN_LOCK_KEY: i64 = 0x7270_775f_7379_6e63;

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Create any missing tables. Safe to run on every `initiate`.
pub async fn bootstrap_schema(pool: &PgPool) -> Result<()> {
    // Multi-statement text needs the simple query protocol.
    pool.execute(SCHEMA_SQL)
        .await
        .context("schema bootstrap failed")?;
    Ok(())
}

/// Pool for DB-backed tests: connects via RPW_DATABASE_URL and bootstraps.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    let pool = connect(&url, 2).await?;
    bootstrap_schema(&pool).await?;
    Ok(pool)
}

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Everything the sync engine needs from the local relational store.
///
/// Query failures are returned as errors and abort the run; a `false` from
/// [`LocalStore::exists`] is the normal "not found" path.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Live column names of `table`.
    async fn columns(&self, table: Table) -> Result<BTreeSet<String>>;

    /// True when at least one row satisfies every condition.
    async fn exists(&self, table: Table, conditions: &[Condition]) -> Result<bool>;

    /// Insert one row. Returns rows written (0 when `DoNothing` hit a conflict).
    async fn insert(&self, table: Table, record: &Record, on_conflict: OnConflict) -> Result<u64>;

    /// Overwrite the fields in `record` on every row matching `conditions`.
    async fn update(&self, table: Table, record: &Record, conditions: &[Condition]) -> Result<u64>;

    /// Sum of stored holdings for `asset`, excluding burn addresses.
    async fn derived_supply(&self, asset: &str) -> Result<i64>;

    /// Locally stored order hashes for `asset`, split by side and sorted.
    ///
    /// With a `base`, each side is restricted to orders whose opposite leg
    /// is `base`.
    async fn order_hashes(&self, asset: &str, base: Option<&str>) -> Result<OrderSides<String>>;

    /// Distinct dispenser source addresses, sorted.
    async fn dispenser_sources(&self) -> Result<Vec<String>>;
}

// ---------------------------------------------------------------------------
// Run lock
// ---------------------------------------------------------------------------

/// Session-level advisory lock that serializes sync runs across processes.
///
/// Held on its own connection, outside the store pool, so a pool of any size
/// stays fully available to the run. [`RunLock::release`] unlocks and closes
/// the connection; dropping the guard closes the socket, which ends the
/// session and frees the lock server-side.
pub struct RunLock {
    conn: PgConnection,
}

pub async fn try_acquire_run_lock(url: &str) -> Result<RunLock> {
    let mut conn = PgConnection::connect(url)
        .await
        .context("connect for run lock failed")?;
    let (locked,): (bool,) = sqlx::query_as("select pg_try_advisory_lock($1)")
        .bind(RUN_LOCK_KEY)
        .fetch_one(&mut conn)
        .await
        .context("pg_try_advisory_lock failed")?;
    if !locked {
        bail!("RUN_LOCKED: another sync run holds the run lock");
    }
    Ok(RunLock { conn })
}

impl RunLock {
    pub async fn release(mut self) -> Result<()> {
        sqlx::query("select pg_advisory_unlock($1)")
            .bind(RUN_LOCK_KEY)
            .execute(&mut self.conn)
            .await
            .context("pg_advisory_unlock failed")?;
        self.conn
            .close()
            .await
            .context("closing run lock connection failed")?;
        Ok(())
    }
}
