use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::tempdir;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join(relative)
}

#[test]
fn simulate_runs_and_writes_trace() {
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("result_set.txt");
    let config = repo_path("test_data/simple.krpsim");

    let mut cmd = Command::cargo_bin("simulate").unwrap();
    cmd.args([
        config.to_str().unwrap(),
        "100",
        "-o",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains(
        "Nice file! 2 processes, 2 stocks, 1 to optimize",
    ))
    .stdout(predicate::str::contains("0:achat"))
    .stdout(predicate::str::contains("Stock :"));
    assert!(out.exists());
}

#[test]
fn simulate_then_verify_round_trips() {
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("trace.txt");
    let config = repo_path("test_data/factory.krpsim");

    let mut simulate = Command::cargo_bin("simulate").unwrap();
    simulate
        .args([
            config.to_str().unwrap(),
            "500",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    let mut verify = Command::cargo_bin("verify").unwrap();
    verify
        .args([config.to_str().unwrap(), out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation completed :)"));
}

#[test]
fn simulate_reports_deadlock_termination() {
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("trace.txt");
    let config = repo_path("test_data/deadlock.krpsim");

    let mut cmd = Command::cargo_bin("simulate").unwrap();
    cmd.args([config.to_str().unwrap(), "50", "-o", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("no more process doable at time 1"))
        .stdout(predicate::str::contains("chair => 1"))
        .stdout(predicate::str::contains("wood => 1"));
}

#[test]
fn simulate_refuses_wrong_extension() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("simple.conf");
    std::fs::write(&config, "euro:10\n").unwrap();

    let mut cmd = Command::cargo_bin("simulate").unwrap();
    cmd.args([config.to_str().unwrap(), "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(".krpsim extension"));
}

#[test]
fn simulate_rejects_broken_config_with_line() {
    let out_dir = tempdir().unwrap();
    let out = out_dir.path().join("trace.txt");
    let config = repo_path("test_data/broken.krpsim");

    let mut cmd = Command::cargo_bin("simulate").unwrap();
    cmd.args([config.to_str().unwrap(), "10", "-o", out.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("duplicate stock"));
}

#[test]
fn verify_refuses_wrong_trace_extension() {
    let config = repo_path("test_data/simple.krpsim");
    let mut cmd = Command::cargo_bin("verify").unwrap();
    cmd.args([config.to_str().unwrap(), "trace.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(".txt extension"));
}

#[test]
fn verify_catches_tampered_trace() {
    let dir = tempdir().unwrap();
    let config = repo_path("test_data/simple.krpsim");
    let trace = dir.path().join("trace.txt");
    // vente at cycle 0 spends a widget that was never produced.
    std::fs::write(&trace, "0:vente\n0:achat\n3\n").unwrap();

    let mut cmd = Command::cargo_bin("verify").unwrap();
    cmd.args([config.to_str().unwrap(), trace.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Cycle 0"))
        .stdout(predicate::str::contains("Insufficient"))
        .stdout(predicate::str::contains("widget"));
}

#[test]
fn verify_rejects_malformed_trace_file() {
    let dir = tempdir().unwrap();
    let config = repo_path("test_data/simple.krpsim");
    let trace = dir.path().join("trace.txt");
    std::fs::write(&trace, "0:achat\n").unwrap();

    let mut cmd = Command::cargo_bin("verify").unwrap();
    cmd.args([config.to_str().unwrap(), trace.to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing the final cycle"));
}

#[test]
fn simulate_requires_positive_cycle_budget() {
    let config = repo_path("test_data/simple.krpsim");
    let mut cmd = Command::cargo_bin("simulate").unwrap();
    cmd.args([config.to_str().unwrap(), "0"]).assert().failure();
}
