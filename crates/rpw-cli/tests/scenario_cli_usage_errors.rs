use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn rpw() -> Command {
    let mut cmd = Command::cargo_bin("rpw").expect("rpw binary");
    // never pick up a developer's .env.local or database
    cmd.env_remove("RPW_DATABASE_URL");
    cmd
}

#[test]
fn cli_list_without_names_prints_usage() {
    rpw()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn cli_start_without_name_prints_usage() {
    rpw()
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn cli_unknown_command_is_rejected() {
    rpw().arg("resync-everything").assert().failure();
}

#[test]
fn cli_help_lists_every_mode() {
    let assert = rpw().arg("--help").assert().success();
    let out = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    for mode in ["full", "list", "start", "sync", "initiate", "addresses", "checkpoint"] {
        assert!(out.contains(mode), "help is missing {mode}");
    }
}

#[test]
fn cli_sync_without_database_env_fails_naming_the_variable() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("rpw.yaml");
    std::fs::write(&cfg, "database:\n  url_env: RPW_CLI_TEST_DB_URL_NEVER_SET\n").unwrap();

    rpw()
        .current_dir(dir.path())
        .args(["--config", cfg.to_str().unwrap(), "sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RPW_CLI_TEST_DB_URL_NEVER_SET"));
}

fn state_config(dir: &std::path::Path, state: &std::path::Path) -> std::path::PathBuf {
    let cfg = dir.join("rpw.yaml");
    std::fs::write(&cfg, format!("paths:\n  state_file: \"{}\"\n", state.display())).unwrap();
    cfg
}

#[test]
fn cli_checkpoint_set_requires_the_run_lock() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("db_state.txt");
    std::fs::write(&state, "1000\n").unwrap();
    let cfg = state_config(dir.path(), &state);

    rpw()
        .current_dir(dir.path())
        .args(["--config", cfg.to_str().unwrap(), "checkpoint", "--set", "1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RPW_DATABASE_URL"));

    assert_eq!(std::fs::read_to_string(&state).unwrap().trim(), "1000");
}

/// DB-backed; skipped when RPW_DATABASE_URL is not set.
#[test]
fn cli_checkpoint_set_then_read_back() {
    if std::env::var("RPW_DATABASE_URL").is_err() {
        eprintln!("SKIP: RPW_DATABASE_URL not set");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state").join("db_state.txt");
    let cfg = state_config(dir.path(), &state);
    let cfg_s = cfg.to_str().unwrap();

    Command::cargo_bin("rpw")
        .unwrap()
        .current_dir(dir.path())
        .args(["--config", cfg_s, "checkpoint", "--set", "1234"])
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint=1234"));

    rpw()
        .current_dir(dir.path())
        .args(["checkpoint", "--config", cfg_s])
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint=1234"));

    assert_eq!(std::fs::read_to_string(&state).unwrap().trim(), "1234");
}

#[test]
fn cli_checkpoint_defaults_to_genesis_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("rpw.yaml");
    std::fs::write(
        &cfg,
        format!(
            "paths:\n  state_file: \"{}\"\nsync:\n  genesis_block: 4242\n",
            dir.path().join("db_state.txt").display()
        ),
    )
    .unwrap();

    rpw()
        .current_dir(dir.path())
        .args(["--config", cfg.to_str().unwrap(), "checkpoint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("checkpoint=4242"));
}
