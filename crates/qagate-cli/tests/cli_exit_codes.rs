//! Exit codes of the `qagate` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn qagate(root: &Path) -> assert_cmd::Command {
    let mut c = cargo_bin_cmd!("qagate");
    c.arg("--root")
        .arg(root)
        .env_remove("QAGATE_CONFIG")
        .env_remove("QAGATE_JOBS");
    c
}

fn repo(config: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
    fs::write(dir.path().join("qagate.toml"), config).unwrap();
    dir
}

const CONFIG: &str = r#"
[[scopes]]
name = "notes"
extensions = ["txt"]

[[custom_tools]]
id = "pass"
dimensions = ["lint"]
extensions = ["txt"]
scopes = ["notes"]
command = ["sh", "-c", "exit 0", "sh", "{files}"]
availability = ["sh", "-c", "echo pass 1.0"]
parser = "exit_code"

[[custom_tools]]
id = "fail"
dimensions = ["test"]
extensions = ["txt"]
scopes = ["notes"]
command = ["sh", "-c", "echo '2 tests failed' >&2; exit 1"]
availability = ["sh", "-c", "echo fail 1.0"]
parser = "exit_code"
"#;

#[test]
fn green_run_exits_zero() {
    let dir = repo(CONFIG);
    qagate(dir.path())
        .args(["check", "--dimension", "lint"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"));
}

#[test]
fn red_run_exits_one_and_reports_json() {
    let dir = repo(CONFIG);
    let assert = qagate(dir.path())
        .args(["check", "--dimension", "test", "--format", "json"])
        .assert()
        .code(1);
    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["overall"], "red");
}

#[test]
fn configuration_errors_exit_two() {
    let dir = repo(CONFIG);
    qagate(dir.path())
        .args(["check", "--scope", "nonexistent"])
        .assert()
        .code(2);

    let bad = repo("[run]\njobs = 0\n");
    qagate(bad.path()).arg("detect").assert().code(2);

    let unknown_key = repo("[run]\nparallelism = 4\n");
    qagate(unknown_key.path())
        .arg("tools")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn detect_prints_scopes() {
    let dir = repo(CONFIG);
    qagate(dir.path())
        .arg("detect")
        .assert()
        .success()
        .stdout(predicate::str::diff("notes\n"));
}
