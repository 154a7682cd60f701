//! End-to-end tests for the `rbank` binary.

use assert_cmd::{Command, cargo_bin_cmd};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn rbank(db: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("rbank");
    cmd.env("NO_COLOR", "1").arg("--db").arg(db);
    cmd
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("rbank")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("insert-pattern"))
        .stdout(predicate::str::contains("retrieve"))
        .stdout(predicate::str::contains("optimize"));
}

#[test]
fn test_init_creates_file() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("nested").join("bank.json");

    rbank(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));
    assert!(db.exists());
}

#[test]
fn test_insert_then_retrieve() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bank.json");

    rbank(&db)
        .args(["insert-pattern", "db-opt", "index", "the", "query"])
        .assert()
        .success()
        .stdout(predicate::str::contains("db-opt"));

    rbank(&db)
        .args(["retrieve", "index the query", "-k", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 memories"))
        .stdout(predicate::str::contains("similarity 1.000"))
        .stdout(predicate::str::contains("Based on 1 similar experiences"));

    rbank(&db)
        .args(["retrieve", "index the query", "--domain", "elsewhere"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 0 memories"))
        .stdout(predicate::str::contains("Context:").not());
}

#[test]
fn test_stats_and_optimize() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bank.json");

    for _ in 0..2 {
        rbank(&db)
            .args(["insert-pattern", "caching", "warm the cache"])
            .assert()
            .success();
    }

    rbank(&db)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Patterns: 2"))
        .stdout(predicate::str::contains("caching (2)"))
        .stdout(predicate::str::contains("experience (2)"));

    rbank(&db)
        .args(["optimize", "--domain", "caching"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Consolidated: 1"));

    rbank(&db)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Patterns: 1"));
}

#[test]
fn test_judge_and_distill() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bank.json");
    let trajectory = dir.path().join("trajectory.json");
    std::fs::write(
        &trajectory,
        r#"{
            "task": "api-opt",
            "steps": [{"action": "add cache", "result": "p95 halved"}],
            "outcome": "failure"
        }"#,
    )
    .unwrap();

    rbank(&db)
        .arg("judge")
        .arg(&trajectory)
        .assert()
        .success()
        .stdout(predicate::str::contains("failure"));

    rbank(&db)
        .arg("distill")
        .arg(&trajectory)
        .args(["--verdict", "needs_review"])
        .assert()
        .success()
        .stdout(predicate::str::contains("needs_review"))
        .stdout(predicate::str::contains("Based on 1 memories"));

    rbank(&db)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("trajectory (1)"));
}

#[test]
fn test_invalid_trajectory_fails() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("bank.json");
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{\"task\": 3}").unwrap();

    rbank(&db)
        .arg("judge")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid trajectory"));
}

#[test]
fn test_directory_as_db_fails() {
    let dir = TempDir::new().unwrap();

    rbank(dir.path())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open pattern file"));
}
