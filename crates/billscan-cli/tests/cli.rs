//! End-to-end checks of the `billscan` binary that need no network.

use assert_cmd::Command;
use predicates::prelude::*;

fn billscan() -> Command {
    let mut cmd = Command::cargo_bin("billscan").unwrap();
    cmd.env_remove("BILLSCAN_COMPLETION_API_KEY");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    billscan()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let path = path.to_str().unwrap();

    billscan()
        .args(["config", "init", "--output", path])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    billscan()
        .args(["--config", path, "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CaptchaCookie"));

    billscan()
        .args(["config", "init", "--output", path])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let path = path.to_str().unwrap();

    billscan()
        .args(["--config", path, "config", "set", "completion.model", "llama-3.3-70b-versatile"])
        .assert()
        .success();

    billscan()
        .args(["--config", path, "config", "get", "completion.model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llama-3.3-70b-versatile"));

    billscan()
        .args(["--config", path, "config", "get", "completion.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn test_ingest_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    billscan()
        .current_dir(dir.path())
        .args(["ingest", "does-not-exist.jpg"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_user_add_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let data_dir = dir.path().join("data");
    std::fs::write(
        &config,
        format!(
            r#"{{"storage": {{"data_dir": {:?}}}}}"#,
            data_dir.to_str().unwrap()
        ),
    )
    .unwrap();
    let config = config.to_str().unwrap();

    billscan()
        .args(["--config", config, "user", "add", "user-1", "--name", "Asha"])
        .assert()
        .success();

    billscan()
        .args(["--config", config, "user", "show", "user-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Asha"));

    billscan()
        .args(["--config", config, "user", "show", "user-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown user"));
}
