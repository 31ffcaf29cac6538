//! Overdue scanner tests over the in-memory store
//!
//! Loop tests run on a paused clock so interval ticks advance instantly.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskboard_shared::store::filter::{Filter, Update};
use taskboard_shared::store::identifier::DocumentId;
use taskboard_shared::store::memory::MemoryStore;
use taskboard_shared::store::repository::{Repository, Timeouts};
use taskboard_shared::store::{Collection, Cursor, Document, DocumentStore, StoreError, StoreResult, UpdateOutcome};
use taskboard_worker::alerts::RecordingAlertSink;
use taskboard_worker::scanner::{OverdueScanner, ScanError, ScannerConfig};

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

async fn seed(store: &MemoryStore) {
    let yesterday = (Utc::now() - ChronoDuration::days(1)).to_rfc3339();
    let tomorrow = (Utc::now() + ChronoDuration::days(1)).to_rfc3339();

    for task in [
        json!({"_id": "t1", "title": "Fix bug", "status": "In Progress", "duedate": yesterday}),
        json!({"_id": "t2", "title": "Ship it", "status": "Done", "duedate": yesterday}),
        json!({"_id": "t3", "title": "Plan", "status": "Todo", "duedate": tomorrow}),
        json!({"_id": "t4", "title": "Someday", "status": "Todo"}),
    ] {
        store.insert_one(Collection::Tasks, doc(task)).await.unwrap();
    }
}

fn scanner(store: Arc<dyn DocumentStore>, sink: Arc<RecordingAlertSink>, timeouts: Timeouts) -> OverdueScanner {
    let tasks = Repository::new(store, Collection::Tasks, timeouts);
    OverdueScanner::new(tasks, sink, ScannerConfig::default())
}

/// Fails the first `failures` reads, then behaves like a memory store
struct FlakyStore {
    inner: MemoryStore,
    failures: usize,
    calls: AtomicUsize,
}

/// Never answers a read
struct StalledStore;

#[async_trait]
impl DocumentStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn find(&self, collection: Collection, filter: &Filter) -> StoreResult<Cursor> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(StoreError::Connection("connection reset".into()));
        }
        self.inner.find(collection, filter).await
    }

    async fn insert_one(&self, collection: Collection, doc: Document) -> StoreResult<DocumentId> {
        self.inner.insert_one(collection, doc).await
    }

    async fn update_one(&self, collection: Collection, filter: &Filter, update: &Update) -> StoreResult<UpdateOutcome> {
        self.inner.update_one(collection, filter, update).await
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.inner.delete_one(collection, filter).await
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        self.inner.count(collection, filter).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for StalledStore {
    fn backend(&self) -> &'static str {
        "stalled"
    }

    async fn find(&self, _collection: Collection, _filter: &Filter) -> StoreResult<Cursor> {
        std::future::pending().await
    }

    async fn insert_one(&self, _collection: Collection, _doc: Document) -> StoreResult<DocumentId> {
        std::future::pending().await
    }

    async fn update_one(&self, _collection: Collection, _filter: &Filter, _update: &Update) -> StoreResult<UpdateOutcome> {
        std::future::pending().await
    }

    async fn delete_one(&self, _collection: Collection, _filter: &Filter) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn count(&self, _collection: Collection, _filter: &Filter) -> StoreResult<u64> {
        std::future::pending().await
    }

    async fn ping(&self) -> StoreResult<()> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_reports_only_unfinished_past_due_tasks() {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    let sink = Arc::new(RecordingAlertSink::new());

    let report = scanner(store, sink.clone(), Timeouts::default())
        .scan_once(Utc::now())
        .await
        .unwrap();

    assert_eq!(report.count(), 1);
    assert_eq!(report.tasks[0].id, "t1");
    assert_eq!(report.tasks[0].title, "Fix bug");

    let reports = sink.reports().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0], report);
}

#[tokio::test]
async fn test_scan_is_read_only() {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    let scanner = scanner(store.clone(), Arc::new(RecordingAlertSink::new()), Timeouts::default());

    scanner.scan_once(Utc::now()).await.unwrap();
    scanner.scan_once(Utc::now()).await.unwrap();

    assert_eq!(store.count(Collection::Tasks, &Filter::All).await.unwrap(), 4);
    let fix = store
        .find(Collection::Tasks, &Filter::eq("_id", "t1"))
        .await
        .unwrap()
        .next()
        .unwrap();
    assert_eq!(fix["status"], "In Progress");
}

#[tokio::test]
async fn test_empty_cycle_does_not_alert() {
    let sink = Arc::new(RecordingAlertSink::new());
    let report = scanner(Arc::new(MemoryStore::new()), sink.clone(), Timeouts::default())
        .scan_once(Utc::now())
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(sink.reports().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_is_bounded_by_its_budget() {
    // Give the repository a longer budget so the cycle budget fires first
    let timeouts = Timeouts {
        write: Duration::from_secs(60),
        ..Timeouts::default()
    };
    let scanner = scanner(Arc::new(StalledStore), Arc::new(RecordingAlertSink::new()), timeouts);

    let err = scanner.scan_once(Utc::now()).await.unwrap_err();
    assert!(matches!(err, ScanError::Timeout(d) if d == Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn test_loop_runs_every_interval_until_cancelled() {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;
    let sink = Arc::new(RecordingAlertSink::new());

    let scanner = scanner(store, sink.clone(), Timeouts::default());
    let shutdown = scanner.shutdown_token();
    let handle = scanner.spawn();

    // Ticks at 0s, 30s and 60s
    tokio::time::sleep(Duration::from_secs(65)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(sink.reports().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_does_not_stop_the_loop() {
    let inner = MemoryStore::new();
    seed(&inner).await;
    let store = Arc::new(FlakyStore {
        inner,
        failures: 1,
        calls: AtomicUsize::new(0),
    });
    let sink = Arc::new(RecordingAlertSink::new());

    let scanner = scanner(store.clone(), sink.clone(), Timeouts::default());
    let shutdown = scanner.shutdown_token();
    let handle = scanner.spawn();

    tokio::time::sleep(Duration::from_secs(35)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.reports().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_a_stalled_cycle() {
    let timeouts = Timeouts {
        write: Duration::from_secs(600),
        ..Timeouts::default()
    };
    let tasks = Repository::new(Arc::new(StalledStore), Collection::Tasks, timeouts);
    let config = ScannerConfig {
        interval: Duration::from_secs(30),
        cycle_timeout: Duration::from_secs(600),
    };
    let scanner = OverdueScanner::new(tasks, Arc::new(RecordingAlertSink::new()), config);
    let shutdown = scanner.shutdown_token();
    let handle = scanner.spawn();

    tokio::time::sleep(Duration::from_secs(5)).await;
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scanner should stop promptly")
        .unwrap();
}
