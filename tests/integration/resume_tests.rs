//! Integration tests for resuming, checkpointing and failure handling
//!
//! These tests drive the coordinator against in-memory upstream fakes and a
//! real SQLite checkpoint in a temporary directory.

mod support;

use obit_crawl::crawler::shutdown_channel;
use obit_crawl::storage::{CheckpointError, CheckpointStore, SqliteCheckpointStore};
use obit_crawl::{Coordinator, CrawlOutcome, CrawlState, EntryResult, ObitError};
use std::sync::Arc;
use std::time::Duration;
use support::{people, slug, test_config, FakeMetrics, FakeSource, FlakyStore};
use tempfile::TempDir;
use tokio::sync::Notify;

fn coordinator(
    config: obit_crawl::Config,
    source: Arc<FakeSource>,
    metrics: Arc<FakeMetrics>,
    store: Arc<dyn CheckpointStore>,
) -> Coordinator {
    Coordinator::new(config, source, metrics, store).expect("Failed to create coordinator")
}

fn run_id_for(config: &obit_crawl::Config) -> obit_crawl::RunId {
    config.run_params().unwrap().run_id()
}

#[tokio::test]
async fn test_resume_fetches_only_missing_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "");
    let run_id = run_id_for(&config);
    let members = people("Person", 10);
    let source = Arc::new(FakeSource::new().with_year(1950, &members));
    let store = Arc::new(SqliteCheckpointStore::new(dir.path()));

    // A previous invocation recorded the first four entries
    let mut previous = CrawlState::new();
    previous.root_category = Some(source.root_category());
    for name in &members[..4] {
        previous.record(
            1950,
            name,
            EntryResult {
                slug: slug(name),
                views: 999,
            },
        );
    }
    store.save(&run_id, &previous).unwrap();

    let metrics = Arc::new(FakeMetrics::new());
    let mut crawl = coordinator(
        config,
        Arc::clone(&source),
        Arc::clone(&metrics),
        store.clone(),
    );
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(metrics.call_count(), 6);
    assert_eq!(report.skipped_existing, 4);
    assert_eq!(report.recorded, 6);

    let saved = store.load(&run_id).unwrap().unwrap();
    assert_eq!(saved.entry_count(), 10);
    // Existing values are never overwritten
    assert_eq!(saved.year(1950).unwrap().get(&members[0]).unwrap().views, 999);
    assert_ne!(saved.year(1950).unwrap().get(&members[9]).unwrap().views, 999);

    // Root category came from the checkpoint: only the year was listed
    assert_eq!(source.category_fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1951, "");
    let source = Arc::new(
        FakeSource::new()
            .with_year(1950, &people("Early", 5))
            .with_year(1951, &people("Late", 3)),
    );
    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::new(dir.path()));

    let first_metrics = Arc::new(FakeMetrics::new());
    let report = coordinator(
        config.clone(),
        Arc::clone(&source),
        Arc::clone(&first_metrics),
        Arc::clone(&store),
    )
    .run(shutdown_channel().1)
    .await
    .unwrap();
    assert_eq!(report.recorded, 8);
    assert_eq!(report.years_processed, 2);

    let second_metrics = Arc::new(FakeMetrics::new());
    let mut second = coordinator(config, source, Arc::clone(&second_metrics), store);
    let report = second.run(shutdown_channel().1).await.unwrap();

    assert_eq!(second_metrics.call_count(), 0);
    assert_eq!(report.recorded, 0);
    assert_eq!(report.skipped_existing, 8);
    assert_eq!(second.state().entry_count(), 8);
}

#[tokio::test]
async fn test_structural_entries_are_never_fetched() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "");
    let members = vec![
        "Jane Doe".to_string(),
        "Category:Deaths by decade".to_string(),
        "List of notable deaths".to_string(),
        "Deaths in January 1950".to_string(),
        "John Roe".to_string(),
    ];
    let source = Arc::new(FakeSource::new().with_year(1950, &members));
    let metrics = Arc::new(FakeMetrics::new());

    let mut crawl = coordinator(
        config,
        Arc::clone(&source),
        Arc::clone(&metrics),
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.excluded, 3);
    assert_eq!(report.recorded, 2);
    assert_eq!(source.resolve_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    let mut fetched = metrics.fetched.lock().unwrap().clone();
    fetched.sort();
    assert_eq!(fetched, vec!["Jane_Doe", "John_Roe"]);
}

#[tokio::test]
async fn test_crash_after_checkpoint_boundary_loses_only_unsaved_entries() {
    let dir = TempDir::new().unwrap();
    let config = test_config(
        dir.path(),
        1950,
        1950,
        "max-concurrent-fetches = 1\ncheckpoint-interval = 100",
    );
    let run_id = run_id_for(&config);
    let source = Arc::new(FakeSource::new().with_year(1950, &people("Person", 300)));
    let stalled = Arc::new(Notify::new());
    let metrics = Arc::new(FakeMetrics::new().stalling_at(251, Arc::clone(&stalled)));

    let mut crawl = coordinator(
        config,
        source,
        metrics,
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let handle = tokio::spawn(async move { crawl.run(shutdown_channel().1).await });

    // Entry 251 is in flight; kill the process here
    tokio::time::timeout(Duration::from_secs(30), stalled.notified())
        .await
        .expect("crawl never reached entry 251");
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let reloaded = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.entry_count(), 200);
    assert!(reloaded.root_category.is_some());
}

#[tokio::test]
async fn test_interrupt_takes_final_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "max-concurrent-fetches = 1");
    let run_id = run_id_for(&config);
    let source = Arc::new(FakeSource::new().with_year(1950, &people("Person", 20)));
    let stalled = Arc::new(Notify::new());
    let metrics = Arc::new(FakeMetrics::new().stalling_at(8, Arc::clone(&stalled)));

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let mut crawl = coordinator(
        config,
        source,
        metrics,
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let handle = tokio::spawn(async move {
        let report = crawl.run(shutdown_rx).await;
        (report, crawl.phase())
    });

    stalled.notified().await;
    shutdown_tx.send(true).unwrap();
    let (report, phase) = tokio::time::timeout(Duration::from_secs(30), handle)
        .await
        .unwrap()
        .unwrap();
    let report = report.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Interrupted);
    assert_eq!(report.recorded, 7);
    assert_eq!(phase, obit_crawl::CrawlPhase::Interrupted);

    let reloaded = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.entry_count(), 7);
}

#[tokio::test]
async fn test_corrupt_checkpoint_aborts_without_writing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "");
    let run_id = run_id_for(&config);
    let store = Arc::new(SqliteCheckpointStore::new(dir.path()));
    let path = store.path_for(&run_id);
    std::fs::write(&path, b"definitely not a database").unwrap();

    let source = Arc::new(FakeSource::new().with_year(1950, &people("Person", 3)));
    let metrics = Arc::new(FakeMetrics::new());
    let mut crawl = coordinator(config, Arc::clone(&source), Arc::clone(&metrics), store);
    let err = crawl.run(shutdown_channel().1).await.unwrap_err();

    assert!(matches!(
        err,
        ObitError::Checkpoint(CheckpointError::Corrupt { .. })
    ));
    assert_eq!(crawl.phase(), obit_crawl::CrawlPhase::Aborted);
    assert_eq!(source.category_fetches.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(metrics.call_count(), 0);
    // Left untouched for inspection
    assert_eq!(std::fs::read(&path).unwrap(), b"definitely not a database");
}

#[tokio::test]
async fn test_fresh_ignores_existing_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "");
    let run_id = run_id_for(&config);
    let store = Arc::new(SqliteCheckpointStore::new(dir.path()));
    std::fs::write(store.path_for(&run_id), b"garbage").unwrap();

    let metrics = Arc::new(FakeMetrics::new());
    let mut crawl = coordinator(
        config,
        Arc::new(FakeSource::new().with_year(1950, &people("Person", 4))),
        Arc::clone(&metrics),
        store.clone(),
    )
    .with_fresh(true);
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.recorded, 4);
    assert_eq!(store.load(&run_id).unwrap().unwrap().entry_count(), 4);
}

#[tokio::test]
async fn test_missing_year_aborts_after_saving_progress() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1952, "");
    let run_id = run_id_for(&config);
    let source = Arc::new(
        FakeSource::new()
            .with_year(1950, &people("Person", 3))
            .with_year(1952, &people("Other", 2)),
    );

    let mut crawl = coordinator(
        config,
        source,
        Arc::new(FakeMetrics::new()),
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let err = crawl.run(shutdown_channel().1).await.unwrap_err();

    match err {
        ObitError::YearNotFound { year, title } => {
            assert_eq!(year, 1951);
            assert_eq!(title, "Category:1951 deaths");
        }
        other => panic!("expected YearNotFound, got {:?}", other),
    }

    let saved = SqliteCheckpointStore::new(dir.path())
        .load(&run_id)
        .unwrap()
        .unwrap();
    assert_eq!(saved.entry_count(), 3);
    assert!(saved.year(1952).is_none());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "max-retries = 3");
    let members = vec!["Jane Doe".to_string(), "John Roe".to_string()];
    let metrics = Arc::new(
        FakeMetrics::new()
            .with_views("Jane Doe", 42)
            .with_flaky("Jane Doe", 2),
    );

    let mut crawl = coordinator(
        config,
        Arc::new(FakeSource::new().with_year(1950, &members)),
        Arc::clone(&metrics),
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.recorded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(metrics.call_count(), 4);
    assert_eq!(crawl.state().year(1950).unwrap().get("Jane Doe").unwrap().views, 42);
}

#[tokio::test]
async fn test_skipped_failure_is_retried_by_next_run() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "max-retries = 1");
    let members = vec!["Jane Doe".to_string(), "John Roe".to_string()];
    let source = Arc::new(FakeSource::new().with_year(1950, &members));
    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::new(dir.path()));

    let broken = Arc::new(FakeMetrics::new().with_broken("John Roe"));
    let report = coordinator(
        config.clone(),
        Arc::clone(&source),
        Arc::clone(&broken),
        Arc::clone(&store),
    )
    .run(shutdown_channel().1)
    .await
    .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.recorded, 1);

    let healthy = Arc::new(FakeMetrics::new().with_views("John Roe", 5));
    let mut rerun = coordinator(config, source, Arc::clone(&healthy), store);
    let report = rerun.run(shutdown_channel().1).await.unwrap();

    assert_eq!(healthy.call_count(), 1);
    assert_eq!(report.recorded, 1);
    assert_eq!(rerun.state().year(1950).unwrap().get("John Roe").unwrap().views, 5);
}

#[tokio::test]
async fn test_unresolvable_entry_is_not_recorded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "");
    let members = vec!["Jane Doe".to_string(), "Removed Page".to_string()];
    let metrics = Arc::new(FakeMetrics::new());

    let mut crawl = coordinator(
        config,
        Arc::new(
            FakeSource::new()
                .with_year(1950, &members)
                .with_unresolvable("Removed Page"),
        ),
        Arc::clone(&metrics),
        Arc::new(SqliteCheckpointStore::new(dir.path())),
    );
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.unresolvable, 1);
    assert_eq!(metrics.call_count(), 1);
    assert!(!crawl.state().is_complete(1950, "Removed Page"));
}

#[tokio::test]
async fn test_failed_checkpoint_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 1950, 1950, "checkpoint-interval = 2");
    let run_id = run_id_for(&config);
    // Saves: root, after 2, after 4, final. The second one fails.
    let store = Arc::new(FlakyStore::new(dir.path(), &[2]));

    let mut crawl = coordinator(
        config,
        Arc::new(FakeSource::new().with_year(1950, &people("Person", 5))),
        Arc::new(FakeMetrics::new()),
        store.clone(),
    );
    let report = crawl.run(shutdown_channel().1).await.unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.recorded, 5);
    assert_eq!(report.checkpoint_failures, 1);
    assert_eq!(report.checkpoints_written, 3);
    assert_eq!(store.load(&run_id).unwrap().unwrap().entry_count(), 5);
}
