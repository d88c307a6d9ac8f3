//! End-to-end tests for the fetch and retry drivers.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use harvester_core::{
    DataLayout, FailureLedger, FetcherConfig, Pipeline, PipelineError, RunOutcome, RunSummary,
    UrlSet,
};
use tempfile::TempDir;

mod support;
use support::{Script, ScriptedSource, pubmed_url};

fn test_config(max_retries: u32) -> FetcherConfig {
    FetcherConfig {
        rate_limit: 0.0,
        concurrency: 2,
        max_retries,
        retry_delay: Duration::from_millis(10),
        ..FetcherConfig::default()
    }
}

fn not_interrupted() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

fn write_question_file(layout: &DataLayout, group: &str, name: &str, urls: &[String]) {
    let dir = layout.root().join("BioASQ-12b").join(group);
    fs::create_dir_all(&dir).unwrap();
    let body = serde_json::json!({
        "questions": [
            { "body": "q1", "documents": urls },
            { "body": "q2", "documents": [] }
        ]
    });
    fs::write(dir.join(name), body.to_string()).unwrap();
}

fn read_ledger(path: &Path) -> Vec<String> {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_run_fetches_summarizes_and_records_failures() {
    tokio::time::pause();
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    let urls = vec![pubmed_url("1"), pubmed_url("2"), pubmed_url("3")];
    write_question_file(&layout, "training", "set1.json", &urls[..2]);
    write_question_file(&layout, "goldset", "gold.json", &urls[1..]);

    let source = Arc::new(ScriptedSource::new().with("3", Script::RateLimited));
    let pipeline = Pipeline::new(source.clone(), &test_config(2), layout.clone()).unwrap();

    let outcome = pipeline.run(not_interrupted()).await.unwrap();

    let summary = outcome.summary().unwrap();
    assert_eq!(summary.total_urls, 3);
    assert_eq!(summary.successful_fetches, 2);
    assert_eq!(summary.failed_fetches, 1);
    assert_eq!(summary.cache_directory_path, layout.cache_dir());
    assert_eq!(source.calls("3"), 2);

    assert_eq!(read_ledger(&layout.ledger_path()), vec![pubmed_url("3")]);
    assert!(layout.cache_dir().join("1.json").exists());
    assert!(layout.cache_dir().join("2.json").exists());
    assert!(!layout.cache_dir().join("3.json").exists());

    let saved = RunSummary::load(&layout.summary_path()).await.unwrap();
    assert_eq!(&saved, summary);

    let exported = fs::read_to_string(layout.url_list_path()).unwrap();
    assert_eq!(exported.lines().collect::<Vec<_>>(), urls);
}

#[tokio::test]
async fn test_retry_pass_clears_ledger_after_success() {
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    FailureLedger::new(layout.ledger_path())
        .settle(&[pubmed_url("5")])
        .await
        .unwrap();

    let source = Arc::new(ScriptedSource::new());
    let pipeline = Pipeline::new(source.clone(), &test_config(3), layout.clone()).unwrap();

    let outcome = pipeline.retry_failed(not_interrupted()).await.unwrap();

    assert_eq!(outcome.successful_fetches(), 1);
    assert_eq!(source.calls("5"), 1);
    assert!(!layout.ledger_path().exists());
    assert!(layout.cache_dir().join("5.json").exists());
}

#[tokio::test]
async fn test_retry_pass_keeps_still_failing_urls() {
    tokio::time::pause();
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    FailureLedger::new(layout.ledger_path())
        .settle(&[pubmed_url("6"), pubmed_url("7")])
        .await
        .unwrap();

    let source = Arc::new(ScriptedSource::new().with("7", Script::ClientError));
    let pipeline = Pipeline::new(source, &test_config(3), layout.clone()).unwrap();

    let outcome = pipeline.retry_failed(not_interrupted()).await.unwrap();

    assert_eq!(outcome.successful_fetches(), 1);
    assert_eq!(read_ledger(&layout.ledger_path()), vec![pubmed_url("7")]);
}

#[tokio::test]
async fn test_retry_pass_without_ledger_does_nothing() {
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    let source = Arc::new(ScriptedSource::new());
    let pipeline = Pipeline::new(source.clone(), &test_config(3), layout.clone()).unwrap();

    let outcome = pipeline.retry_failed(not_interrupted()).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToDo);
    assert_eq!(source.total_calls(), 0);
    assert!(!layout.summary_path().exists());
}

#[tokio::test]
async fn test_run_without_sources_does_nothing() {
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    let source = Arc::new(ScriptedSource::new());
    let pipeline = Pipeline::new(source.clone(), &test_config(3), layout.clone()).unwrap();

    let outcome = pipeline.run(not_interrupted()).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingToDo);
    assert_eq!(source.total_calls(), 0);
    assert!(!layout.url_list_path().exists());
    assert!(!layout.summary_path().exists());
    assert!(!layout.ledger_path().exists());
}

#[tokio::test]
async fn test_rerun_after_success_makes_no_calls() {
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    write_question_file(&layout, "training", "set.json", &[pubmed_url("8"), pubmed_url("9")]);

    let first = Arc::new(ScriptedSource::new());
    Pipeline::new(first.clone(), &test_config(3), layout.clone())
        .unwrap()
        .run(not_interrupted())
        .await
        .unwrap();
    assert_eq!(first.total_calls(), 2);

    let second = Arc::new(ScriptedSource::new());
    let outcome = Pipeline::new(second.clone(), &test_config(3), layout.clone())
        .unwrap()
        .run(not_interrupted())
        .await
        .unwrap();

    assert_eq!(second.total_calls(), 0);
    assert_eq!(outcome.successful_fetches(), 2);
    assert!(!layout.ledger_path().exists());
}

#[tokio::test]
async fn test_run_urls_bypasses_collection() {
    let temp = TempDir::new().unwrap();
    let layout = DataLayout::new(temp.path());
    let source = Arc::new(ScriptedSource::new());
    let pipeline = Pipeline::new(source, &test_config(3), layout.clone()).unwrap();
    let urls: UrlSet = [pubmed_url("11")].into_iter().collect();

    let outcome = pipeline.run_urls(&urls, not_interrupted()).await.unwrap();

    assert_eq!(outcome.successful_fetches(), 1);
    assert!(!layout.url_list_path().exists());
    assert!(layout.summary_path().exists());
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_any_work() {
    let temp = TempDir::new().unwrap();
    let config = FetcherConfig {
        concurrency: 0,
        ..FetcherConfig::default()
    };

    let result = Pipeline::new(
        Arc::new(ScriptedSource::new()),
        &config,
        DataLayout::new(temp.path()),
    );

    assert!(matches!(result, Err(PipelineError::Config(_))));
}
