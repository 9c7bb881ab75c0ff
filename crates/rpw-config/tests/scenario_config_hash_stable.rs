//! Config hash stability.
//!
//! GREEN when:
//! - the same layers hash identically across calls
//! - key order inside a YAML document does not change the hash
//! - different values produce different hashes
//! - overlays take effect and still hash deterministically

use rpw_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
database:
  url_env: "RPW_DATABASE_URL"
source:
  base_url: "https://xchain.io/api"
  timeout_secs: 30
paths:
  state_file: "data/db_state.txt"
"#;

const BASE_YAML_REORDERED: &str = r#"
paths:
  state_file: "data/db_state.txt"
source:
  timeout_secs: 30
  base_url: "https://xchain.io/api"
database:
  url_env: "RPW_DATABASE_URL"
"#;

const OVERLAY_YAML: &str = r#"
source:
  timeout_secs: 5
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        original.config_hash, reordered.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base() {
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(
        merged
            .config_json
            .pointer("/source/timeout_secs")
            .and_then(|v| v.as_u64()),
        Some(5)
    );
    assert_eq!(
        merged
            .config_json
            .pointer("/source/base_url")
            .and_then(|v| v.as_str()),
        Some("https://xchain.io/api"),
        "overlay must not drop sibling keys"
    );
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
