//! CLI smoke tests: the binary is a thin adapter, so these only verify
//! wiring and exit-code policy.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn init_update_status_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("a.py"), "def f():\n    pass\n").unwrap();

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 added"));

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Function"));
}

#[test]
fn update_exits_zero_despite_parse_errors() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("broken.py"), "def broken(:\n").unwrap();

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["init"])
        .assert()
        .success();

    // Parse errors are reported in the output but do not fail the run.
    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["update"])
        .assert()
        .success()
        .stdout(predicate::str::contains("parse issues"));
}

#[test]
fn query_rejects_write_verbs() {
    let tmp = tempfile::tempdir().unwrap();

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["init"])
        .assert()
        .success();

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["query", "MATCH (n) DETACH DELETE n"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Query rejected"));
}

#[test]
fn reset_removes_the_data_directory() {
    let tmp = tempfile::tempdir().unwrap();

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["init"])
        .assert()
        .success();
    assert!(tmp.path().join(".codegraph").exists());

    Command::cargo_bin("codegraph")
        .unwrap()
        .current_dir(tmp.path())
        .args(["reset"])
        .assert()
        .success();
    assert!(!tmp.path().join(".codegraph").exists());
}
