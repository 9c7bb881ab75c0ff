//! Catalog and burn-address files.

use rpw_config::{load_burn_addresses, load_catalog};

#[test]
fn catalog_preserves_file_order_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"[
  {"asset": "RAREPEPE", "image_file_name": "RAREPEPE.jpg", "directory_url": "http://rarepepedirectory.com/?p=1", "series": "1"},
  {"asset": "PEPECASH"},
  {"asset": "BOOKOFORBS", "series": "2"}
]"#,
    )
    .unwrap();

    let catalog = load_catalog(&path).unwrap();
    assert_eq!(catalog.names(), vec!["RAREPEPE", "PEPECASH", "BOOKOFORBS"]);
    let first = catalog.get("RAREPEPE").unwrap();
    assert_eq!(first.image_file_name.as_deref(), Some("RAREPEPE.jpg"));
    assert_eq!(first.series.as_deref(), Some("1"));
    assert!(catalog.get("PEPECASH").unwrap().series.is_none());
    assert_eq!(catalog.suffix_from("PEPECASH").unwrap(), vec!["PEPECASH", "BOOKOFORBS"]);
}

#[test]
fn malformed_catalog_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(&path, r#"{"asset": "NOT_AN_ARRAY"}"#).unwrap();
    assert!(load_catalog(&path).is_err());
}

#[test]
fn missing_catalog_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = format!("{:#}", load_catalog(&path).unwrap_err());
    assert!(err.contains("absent.json"), "got: {err}");
}

#[test]
fn burn_addresses_load_one_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("burn.txt");
    std::fs::write(&path, "1CounterpartyXXXXXXXXXXXXXXXUWLpVr\n\n1BurnPepeXXXXXXXXXXXXXXXXXXXAK33R\n").unwrap();
    let got = load_burn_addresses(&path).unwrap();
    assert_eq!(
        got,
        vec![
            "1CounterpartyXXXXXXXXXXXXXXXUWLpVr",
            "1BurnPepeXXXXXXXXXXXXXXXXXXXAK33R"
        ]
    );
}
