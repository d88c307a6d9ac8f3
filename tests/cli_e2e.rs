//! End-to-end CLI tests for the harvester binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn harvester() -> Command {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.env_remove("NCBI_EMAIL")
        .env_remove("NCBI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    harvester()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("biomedical abstracts"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    harvester()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvester"));
}

/// Test that a missing subcommand is rejected.
#[test]
fn test_binary_without_subcommand_returns_error() {
    harvester().assert().failure();
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    harvester()
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_fetch_requires_email() {
    let temp = TempDir::new().unwrap();
    harvester()
        .args(["fetch", "--data-dir"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--email"));
}

#[test]
fn test_fetch_rejects_out_of_range_concurrency() {
    harvester()
        .args(["fetch", "--email", "me@example.org", "-c", "0"])
        .assert()
        .failure();
}

#[test]
fn test_collect_with_empty_data_dir_succeeds() {
    let temp = TempDir::new().unwrap();
    harvester()
        .args(["-q", "collect", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success();
    assert!(!temp.path().join("unique_pubmed_urls.txt").exists());
}

#[test]
fn test_collect_exports_unique_urls() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("BioASQ-12b").join("training");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("set.json"),
        r#"{"questions": [
            {"documents": ["http://www.ncbi.nlm.nih.gov/pubmed/2", "http://www.ncbi.nlm.nih.gov/pubmed/1"]},
            {"documents": ["http://www.ncbi.nlm.nih.gov/pubmed/1"]}
        ]}"#,
    )
    .unwrap();

    harvester()
        .args(["collect", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Collected 2 unique URLs"));

    let exported = std::fs::read_to_string(temp.path().join("unique_pubmed_urls.txt")).unwrap();
    assert_eq!(
        exported.lines().collect::<Vec<_>>(),
        vec![
            "http://www.ncbi.nlm.nih.gov/pubmed/1",
            "http://www.ncbi.nlm.nih.gov/pubmed/2"
        ]
    );
}

#[test]
fn test_retry_without_ledger_reports_nothing_to_do() {
    let temp = TempDir::new().unwrap();
    harvester()
        .args(["retry", "--email", "me@example.org", "--no-progress", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No failed URLs to retry."));
}

#[test]
fn test_retry_keeps_unresolvable_urls_in_ledger() {
    let temp = TempDir::new().unwrap();
    let ledger = harvester_core::FailureLedger::new(temp.path().join("failed_urls.json"));
    tokio_test::block_on(async {
        ledger
            .settle(&["http://www.ncbi.nlm.nih.gov/".to_string()])
            .await
            .unwrap();
    });

    harvester()
        .args(["retry", "--email", "me@example.org", "--no-progress", "--data-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total URLs: 1"))
        .stdout(predicate::str::contains("Failed: 1"));

    let loaded = tokio_test::block_on(ledger.load()).unwrap();
    assert!(loaded.contains("http://www.ncbi.nlm.nih.gov/"));
    assert!(temp.path().join("fetch_summary.json").exists());
}
