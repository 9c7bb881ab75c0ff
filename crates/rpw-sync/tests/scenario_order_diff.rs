use rpw_config::{Catalog, SyncConfig};
use rpw_schemas::{Condition, FieldValue, OrderSide, Table};
use rpw_sync::{CheckpointStore, SyncEngine};
use rpw_testkit::{record, MemoryStore, ScriptedSource};

fn stored_order(hash: &str, give: &str, get: &str, status: &str) -> rpw_schemas::Record {
    record([
        ("tx_hash", hash),
        ("give_asset", give),
        ("get_asset", get),
        ("status", status),
    ])
}

fn status_of(store: &MemoryStore, hash: &str) -> Option<FieldValue> {
    store
        .find(Table::Orders, &[Condition::eq("tx_hash", hash)])
        .map(|r| r["status"].clone())
}

#[tokio::test]
async fn scenario_new_hashes_inserted_known_updated_local_only_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cp = CheckpointStore::new(dir.path().join("db_state.txt"), 1000);
    let store = MemoryStore::new();
    store.seed(Table::Orders, stored_order("h1", "PEPE", "XCP", "open"));
    store.seed(Table::Orders, stored_order("h2", "XCP", "PEPE", "open"));

    let src = ScriptedSource::new()
        .with_asset("PEPE", 1)
        .with_order("PEPE", OrderSide::Get, stored_order("h2", "XCP", "PEPE", "filled"))
        .with_order("PEPE", OrderSide::Give, stored_order("h3", "PEPE", "XCP", "open"));
    let cat = Catalog::from_names(["PEPE"]).unwrap();
    let cfg = SyncConfig::default();

    let report = SyncEngine::new(&store, &src, &cp, &cat, &cfg)
        .sync_list(&["PEPE".to_string()])
        .await
        .unwrap();

    assert_eq!(store.row_count(Table::Orders), 3);
    assert_eq!(status_of(&store, "h1"), Some(FieldValue::from("open")));
    assert_eq!(status_of(&store, "h2"), Some(FieldValue::from("filled")));
    assert_eq!(status_of(&store, "h3"), Some(FieldValue::from("open")));
    assert_eq!(report.inserted(Table::Orders), 1);
    assert_eq!(report.updated(Table::Orders), 1);
}

#[tokio::test]
async fn scenario_hash_on_both_sides_uses_give_record() {
    let dir = tempfile::tempdir().unwrap();
    let cp = CheckpointStore::new(dir.path().join("db_state.txt"), 1000);
    let store = MemoryStore::new();

    let src = ScriptedSource::new()
        .with_asset("PEPE", 1)
        .with_order("PEPE", OrderSide::Give, stored_order("hx", "PEPE", "PEPE", "give-view"))
        .with_order("PEPE", OrderSide::Get, stored_order("hx", "PEPE", "PEPE", "get-view"));
    let cat = Catalog::from_names(["PEPE"]).unwrap();
    let cfg = SyncConfig::default();

    SyncEngine::new(&store, &src, &cp, &cat, &cfg)
        .sync_list(&["PEPE".to_string()])
        .await
        .unwrap();

    assert_eq!(store.row_count(Table::Orders), 1);
    assert_eq!(status_of(&store, "hx"), Some(FieldValue::from("give-view")));
}

#[tokio::test]
async fn scenario_base_asset_restricts_local_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let cp = CheckpointStore::new(dir.path().join("db_state.txt"), 1000);
    let store = MemoryStore::new();
    // Stored PEPECASH order against a non-base asset; outside the lookup.
    store.seed(Table::Orders, stored_order("h9", "PEPECASH", "RAREPEPE", "open"));

    let src = ScriptedSource::new()
        .with_asset("PEPECASH", 1)
        .with_order(
            "PEPECASH",
            OrderSide::Give,
            stored_order("h9", "PEPECASH", "RAREPEPE", "filled"),
        );
    let cat = Catalog::from_names(["PEPECASH"]).unwrap();
    let cfg = SyncConfig::default();

    let report = SyncEngine::new(&store, &src, &cp, &cat, &cfg)
        .sync_list(&["PEPECASH".to_string()])
        .await
        .unwrap();

    // Seen as new by the diff, but the upsert still finds the existing key.
    assert_eq!(store.row_count(Table::Orders), 1);
    assert_eq!(report.updated(Table::Orders), 1);
    assert_eq!(status_of(&store, "h9"), Some(FieldValue::from("filled")));
}
