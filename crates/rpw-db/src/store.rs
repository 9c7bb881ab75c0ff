use anyhow::{Context, Result};
use async_trait::async_trait;
use rpw_schemas::{Condition, OrderSides, Record, Table};
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use tracing::debug;

use crate::sql::{self, OnConflict};
use crate::LocalStore;

/// [`LocalStore`] over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn execute_text(&self, sql: &str) -> Result<u64> {
        debug!(sql, "execute");
        // Literal-bearing text is unique per call; do not fill the statement cache.
        let done = sqlx::query(sql)
            .persistent(false)
            .execute(&self.pool)
            .await
            .with_context(|| format!("query failed: {sql}"))?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl LocalStore for PgStore {
    async fn columns(&self, table: Table) -> Result<BTreeSet<String>> {
        let rows = sqlx::query(
            r#"
            select column_name::text as column_name
            from information_schema.columns
            where table_schema = current_schema()
              and table_name = $1
            "#,
        )
        .bind(table.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("column lookup failed for {table}"))?;

        let mut out = BTreeSet::new();
        for row in rows {
            out.insert(row.try_get::<String, _>("column_name")?);
        }
        Ok(out)
    }

    async fn exists(&self, table: Table, conditions: &[Condition]) -> Result<bool> {
        let sql = sql::exists_sql(table, conditions)?;
        debug!(sql = %sql, "exists");
        let row = sqlx::query(&sql)
            .persistent(false)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("query failed: {sql}"))?;
        Ok(row.is_some())
    }

    async fn insert(&self, table: Table, record: &Record, on_conflict: OnConflict) -> Result<u64> {
        let sql = sql::insert_sql(table, record, on_conflict)?;
        self.execute_text(&sql).await
    }

    async fn update(&self, table: Table, record: &Record, conditions: &[Condition]) -> Result<u64> {
        let sql = sql::update_sql(table, record, conditions)?;
        self.execute_text(&sql).await
    }

    async fn derived_supply(&self, asset: &str) -> Result<i64> {
        let (total,): (i64,) = sqlx::query_as(
            r#"
            select coalesce(sum(h.address_quantity), 0)::bigint
            from holdings h
            where h.asset = $1
              and not exists (
                select 1 from addresses a
                where a.address = h.address and a.is_burn = 1
              )
            "#,
        )
        .bind(asset)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("derived supply query failed for {asset}"))?;
        Ok(total)
    }

    async fn order_hashes(&self, asset: &str, base: Option<&str>) -> Result<OrderSides<String>> {
        let give: Vec<String> = sqlx::query_scalar(
            r#"
            select tx_hash from orders
            where give_asset = $1
              and ($2::text is null or get_asset = $2)
            order by tx_hash
            "#,
        )
        .bind(asset)
        .bind(base)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("give-side order lookup failed for {asset}"))?;

        let get: Vec<String> = sqlx::query_scalar(
            r#"
            select tx_hash from orders
            where get_asset = $1
              and ($2::text is null or give_asset = $2)
            order by tx_hash
            "#,
        )
        .bind(asset)
        .bind(base)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("get-side order lookup failed for {asset}"))?;

        Ok(OrderSides { give, get })
    }

    async fn dispenser_sources(&self) -> Result<Vec<String>> {
        let sources: Vec<String> = sqlx::query_scalar(
            r#"
            select distinct source from dispensers
            where source is not null and source <> ''
            order by source
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("dispenser source lookup failed")?;
        Ok(sources)
    }
}
