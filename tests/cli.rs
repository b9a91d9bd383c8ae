//! End-to-end tests for the `tally` binary

use std::fs;
use std::process::Stdio;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PASSWORD: &str = "Sup3rSecret";

fn tally(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("TALLY_DATA_DIR", dir.path())
        .env("TALLY_USER", "alice")
        .env("TALLY_PASSWORD", PASSWORD)
        .env_remove("TALLY_LOG");
    cmd
}

/// Init, register alice, and open a savings and a current account
fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();

    tally(&dir).arg("init").assert().success();
    tally(&dir)
        .args(["user", "register", "alice", "--email", "alice@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registered user: alice"));
    tally(&dir)
        .args(["account", "open", "savings", "--balance", "100"])
        .assert()
        .success();
    tally(&dir)
        .args(["account", "open", "current", "--overdraft", "50"])
        .assert()
        .success();

    dir
}

#[test]
fn test_init_creates_store() {
    let dir = TempDir::new().unwrap();

    tally(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete!"));

    assert!(dir.path().join("data").join("ledger.json").exists());
    assert!(dir.path().join("config.json").exists());
}

#[test]
fn test_config_show() {
    let dir = TempDir::new().unwrap();

    tally(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("backup_retention"));
}

#[test]
fn test_deposit_and_withdraw() {
    let dir = setup();

    tally(&dir)
        .args(["deposit", "savings", "50", "--memo", "paycheck"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New balance: $150.00"));

    tally(&dir)
        .args(["withdraw", "savings", "20.25"])
        .assert()
        .success()
        .stdout(predicate::str::contains("New balance: $129.75"));
}

#[test]
fn test_withdraw_insufficient_funds_fails() {
    let dir = setup();

    tally(&dir)
        .args(["withdraw", "savings", "500"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Insufficient funds"));

    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$100.00"));
}

#[test]
fn test_wrong_password_is_rejected() {
    let dir = setup();

    tally(&dir)
        .env("TALLY_PASSWORD", "Wr0ngPassword")
        .args(["account", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid credentials"));
}

#[test]
fn test_transfer_moves_money() {
    let dir = setup();

    tally(&dir)
        .args(["transfer", "savings", "current", "30", "--memo", "rent"])
        .assert()
        .success();

    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$70.00"));
    tally(&dir)
        .args(["account", "show", "current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$30.00"));

    tally(&dir)
        .args(["history", "--kind", "transfer_out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rent"))
        .stdout(predicate::str::contains("Page 1 of 1 (1 transactions)"));
}

#[test]
fn test_transfer_to_same_account_fails() {
    let dir = setup();

    tally(&dir)
        .args(["transfer", "savings", "savings", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("same account"));
}

#[test]
fn test_export_csv_to_stdout() {
    let dir = setup();

    tally(&dir).args(["deposit", "savings", "5"]).assert().success();

    tally(&dir)
        .args(["export", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ID,Timestamp,Account ID"))
        .stdout(predicate::str::contains("deposit,5.00"));
}

#[test]
fn test_backup_list_and_restore() {
    let dir = setup();

    tally(&dir)
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Available Backups"));

    tally(&dir)
        .args(["backup", "restore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));

    tally(&dir)
        .args(["backup", "restore", "latest", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore complete!"));
}

#[test]
fn test_corrupt_primary_recovers_from_backup() {
    let dir = setup();
    tally(&dir).args(["deposit", "savings", "25"]).assert().success();

    fs::write(dir.path().join("data").join("ledger.json"), b"{ not json").unwrap();

    tally(&dir)
        .args(["account", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("recovered from backup"));

    // The next save replaces the damaged primary
    tally(&dir).args(["deposit", "current", "1"]).assert().success();
    let bytes = fs::read(dir.path().join("data").join("ledger.json")).unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_ok());
}

#[test]
fn test_unrecoverable_store_fails() {
    let dir = TempDir::new().unwrap();
    tally(&dir).arg("init").assert().success();

    fs::write(dir.path().join("data").join("ledger.json"), b"garbage").unwrap();

    tally(&dir)
        .args(["account", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load the ledger store"));
}

#[test]
fn test_overlapping_withdrawals_cannot_both_succeed() {
    let dir = setup();

    let spawn = || {
        std::process::Command::new(assert_cmd::cargo::cargo_bin("tally"))
            .env("TALLY_DATA_DIR", dir.path())
            .env("TALLY_USER", "alice")
            .env("TALLY_PASSWORD", PASSWORD)
            .env_remove("TALLY_LOG")
            .args(["withdraw", "savings", "60"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    };
    let (mut first, mut second) = (spawn(), spawn());
    let succeeded = [first.wait().unwrap(), second.wait().unwrap()]
        .iter()
        .filter(|status| status.success())
        .count();

    assert_eq!(succeeded, 1);
    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$40.00"));
}

#[test]
fn test_mutation_waits_for_store_lock_then_gives_up() {
    let dir = setup();
    tally(&dir)
        .args(["config", "set", "lock_timeout_ms", "200"])
        .assert()
        .success();

    let lock = dir.path().join("data").join("ledger.lock");
    fs::write(&lock, b"PID: 1").unwrap();
    tally(&dir)
        .args(["deposit", "savings", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load the ledger store"));

    fs::remove_file(&lock).unwrap();
    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$100.00"));
}

#[test]
fn test_transfers_list_and_lookup() {
    let dir = setup();
    tally(&dir)
        .args(["transfer", "savings", "current", "30", "--memo", "rent"])
        .assert()
        .success();

    let output = tally(&dir)
        .args(["transfers", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let records: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    let transfer_id = records[0]["transfer_id"].as_str().unwrap().to_string();

    tally(&dir)
        .args(["transfers", &transfer_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Out: Savings"))
        .stdout(predicate::str::contains("$100.00 -> $70.00"))
        .stdout(predicate::str::contains("$0.00 -> $30.00"));

    tally(&dir)
        .args(["transfers", "txf-00000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Transfer not found"));
}

#[test]
fn test_batch_template_preview_and_run() {
    let dir = setup();
    let file = dir.path().join("ops.csv");

    tally(&dir)
        .args(["batch", "template"])
        .arg(&file)
        .assert()
        .success();

    tally(&dir)
        .args(["batch", "run", "--preview"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Preview: all 5 operations would succeed."));
    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$100.00"));

    tally(&dir)
        .args(["batch", "run"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch applied: 5 operations."));
    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$125.00"));
}

#[test]
fn test_rejected_batch_changes_nothing() {
    let dir = setup();
    let file = dir.path().join("ops.json");
    fs::write(
        &file,
        r#"{"operations": [
            {"operation_type": "deposit", "parameters": {"account": "savings", "amount": 10}},
            {"operation_type": "withdraw", "parameters": {"account": "savings", "amount": 1000}}
        ]}"#,
    )
    .unwrap();

    tally(&dir)
        .args(["batch", "run"])
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Nothing was changed."))
        .stderr(predicate::str::contains("batch rejected"));

    tally(&dir)
        .args(["account", "show", "savings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$100.00"));
}
