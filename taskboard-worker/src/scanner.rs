/// Overdue task scanner
///
/// A long-running background loop that periodically looks for tasks whose
/// due date has passed and whose status is not "Done", and reports them
/// through an [`AlertSink`]. The scanner only reads; it never updates or
/// deletes tasks.
///
/// # Cycle policy
///
/// - One cycle per `interval` (30 seconds by default); the first cycle runs
///   immediately
/// - Cycles never overlap: a cycle runs to completion (or its budget) before
///   the next tick is awaited, and ticks missed in the meantime are skipped
/// - Each cycle is bounded by `cycle_timeout` (10 seconds by default)
/// - A failed cycle is logged and the loop carries on with the next tick
/// - Cancelling the shutdown token stops the loop, abandoning a running cycle
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskboard_shared::store::memory::MemoryStore;
/// use taskboard_shared::store::repository::{Repository, Timeouts};
/// use taskboard_shared::store::Collection;
/// use taskboard_worker::alerts::TracingAlertSink;
/// use taskboard_worker::scanner::{OverdueScanner, ScannerConfig};
///
/// # async fn example() {
/// let tasks = Repository::new(Arc::new(MemoryStore::new()), Collection::Tasks, Timeouts::default());
/// let scanner = OverdueScanner::new(tasks, Arc::new(TracingAlertSink), ScannerConfig::default());
/// let shutdown = scanner.shutdown_token();
/// let handle = scanner.spawn();
///
/// shutdown.cancel();
/// handle.await.unwrap();
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use taskboard_shared::config::secs_or;
use taskboard_shared::models::from_document;
use taskboard_shared::models::task::{fields, Task, TaskStatus};
use taskboard_shared::store::filter::Filter;
use taskboard_shared::store::repository::Repository;
use taskboard_shared::store::StoreError;

use crate::alerts::AlertSink;

/// Default time between cycles
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default budget for one cycle
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    pub interval: Duration,
    pub cycle_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

impl ScannerConfig {
    /// Reads `SCANNER_INTERVAL_SECS` and `SCANNER_CYCLE_TIMEOUT_SECS`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            interval: secs_or(&lookup, "SCANNER_INTERVAL_SECS", DEFAULT_INTERVAL)?,
            cycle_timeout: secs_or(&lookup, "SCANNER_CYCLE_TIMEOUT_SECS", DEFAULT_CYCLE_TIMEOUT)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan cycle exceeded its {0:?} budget")]
    Timeout(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueTask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub due_date: DateTime<Utc>,
}

/// Result of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueReport {
    pub checked_at: DateTime<Utc>,
    pub tasks: Vec<OverdueTask>,
}

impl OverdueReport {
    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Tasks not yet done whose due date is strictly before `now`
pub fn overdue_filter(now: DateTime<Utc>) -> Filter {
    Filter::ne(fields::STATUS, TaskStatus::Done.as_str()).and(Filter::lt(fields::DUE_DATE, now.to_rfc3339()))
}

pub struct OverdueScanner {
    tasks: Repository,
    sink: Arc<dyn AlertSink>,
    config: ScannerConfig,
    shutdown: CancellationToken,
}

impl OverdueScanner {
    pub fn new(tasks: Repository, sink: Arc<dyn AlertSink>, config: ScannerConfig) -> Self {
        Self {
            tasks,
            sink,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an externally owned shutdown token
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> ScannerConfig {
        self.config
    }

    /// Runs a single cycle against `now`
    ///
    /// The sink is only called when at least one task is overdue.
    pub async fn scan_once(&self, now: DateTime<Utc>) -> Result<OverdueReport, ScanError> {
        let budget = self.config.cycle_timeout;
        let report = timeout(budget, self.collect(now))
            .await
            .map_err(|_| ScanError::Timeout(budget))??;

        if !report.is_empty() {
            self.sink.overdue(&report).await;
        }
        Ok(report)
    }

    async fn collect(&self, now: DateTime<Utc>) -> Result<OverdueReport, ScanError> {
        let cursor = self.tasks.find(&overdue_filter(now)).await?;

        let mut tasks = Vec::new();
        for doc in cursor {
            let task: Task = match from_document(doc) {
                Ok(task) => task,
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable task");
                    continue;
                }
            };
            // The filter only matches documents carrying a due date
            if let Some(due_date) = task.due_date {
                tasks.push(OverdueTask {
                    id: task.id,
                    title: task.title,
                    status: task.status,
                    due_date,
                });
            }
        }

        Ok(OverdueReport {
            checked_at: now,
            tasks,
        })
    }

    /// Runs cycles until the shutdown token is cancelled
    pub async fn run(&self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            cycle_timeout_secs = self.config.cycle_timeout.as_secs(),
            "Overdue scanner started"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            debug!("Checking for overdue tasks");
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.scan_once(Utc::now()) => match result {
                    Ok(report) => debug!(count = report.count(), "Overdue scan complete"),
                    Err(e) => error!(error = %e, "Overdue scan failed"),
                },
            }
        }

        info!("Overdue scanner stopped");
    }

    /// Moves the scanner onto its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
