//! DB-backed checks for PgStore. Skipped when RPW_DATABASE_URL is not set.

use anyhow::Result;
use rpw_db::{LocalStore, OnConflict, PgStore, ADDRESS_KEY};
use rpw_schemas::{Condition, FieldValue, Record, Table};

async fn store_or_skip() -> Result<Option<PgStore>> {
    if std::env::var(rpw_db::ENV_DB_URL).is_err() {
        eprintln!("SKIP: RPW_DATABASE_URL not set");
        return Ok(None);
    }
    let pool = rpw_db::testkit_db_pool().await?;
    Ok(Some(PgStore::new(pool)))
}

fn holding(asset: &str, address: &str, qty: i64) -> Record {
    let mut r = Record::new();
    r.insert("asset".into(), asset.into());
    r.insert("address".into(), address.into());
    r.insert("address_quantity".into(), qty.into());
    r.insert("escrow".into(), FieldValue::Null);
    r
}

#[tokio::test]
async fn insert_then_update_keeps_one_row() -> Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let asset = "RPWTESTUPSERT";
    sqlx::query("delete from holdings where asset = $1")
        .bind(asset)
        .execute(store.pool())
        .await?;

    let key = [Condition::eq("asset", asset), Condition::eq("address", "1Holder")];
    assert!(!store.exists(Table::Holdings, &key).await?);

    let n = store
        .insert(Table::Holdings, &holding(asset, "1Holder", 10), OnConflict::Error)
        .await?;
    assert_eq!(n, 1);
    assert!(store.exists(Table::Holdings, &key).await?);

    let n = store
        .update(Table::Holdings, &holding(asset, "1Holder", 25), &key)
        .await?;
    assert_eq!(n, 1);

    let (count, qty): (i64, i64) = sqlx::query_as(
        "select count(*)::bigint, coalesce(sum(address_quantity), 0)::bigint from holdings where asset = $1",
    )
    .bind(asset)
    .fetch_one(store.pool())
    .await?;
    assert_eq!((count, qty), (1, 25));
    Ok(())
}

#[tokio::test]
async fn derived_supply_excludes_burn_addresses() -> Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let asset = "RPWTESTBURN";
    sqlx::query("delete from holdings where asset = $1")
        .bind(asset)
        .execute(store.pool())
        .await?;

    let mut burn = Record::new();
    burn.insert("address".into(), "1RpwTestBurnAddr".into());
    burn.insert("is_burn".into(), FieldValue::Bool(true));
    store
        .insert(Table::Addresses, &burn, OnConflict::DoNothing(ADDRESS_KEY))
        .await?;
    // A second insert on the same key is absorbed by the conflict tail.
    let again = store
        .insert(Table::Addresses, &burn, OnConflict::DoNothing(ADDRESS_KEY))
        .await?;
    assert_eq!(again, 0);

    store
        .insert(Table::Holdings, &holding(asset, "1Live", 7), OnConflict::Error)
        .await?;
    store
        .insert(Table::Holdings, &holding(asset, "1RpwTestBurnAddr", 100), OnConflict::Error)
        .await?;

    assert_eq!(store.derived_supply(asset).await?, 7);
    Ok(())
}

#[tokio::test]
async fn columns_reflect_live_schema() -> Result<()> {
    let Some(store) = store_or_skip().await? else {
        return Ok(());
    };
    let cols = store.columns(Table::Addresses).await?;
    assert!(cols.contains("address"));
    assert!(cols.contains("is_burn"));
    assert!(!cols.contains("asset"));
    Ok(())
}
