/// Overdue alert delivery
///
/// The scanner hands each non-empty report to an [`AlertSink`]. Alerts are
/// in-process only: the default sink writes them to the tracing output.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::scanner::OverdueReport;

#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Called once per cycle that found at least one overdue task
    async fn overdue(&self, report: &OverdueReport);
}

/// Logs every overdue task at `warn` level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn overdue(&self, report: &OverdueReport) {
        warn!(
            count = report.tasks.len(),
            checked_at = %report.checked_at,
            "Found overdue tasks"
        );
        for task in &report.tasks {
            warn!(
                task_id = %task.id,
                title = %task.title,
                due = %task.due_date,
                status = %task.status,
                "Task is overdue"
            );
        }
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    reports: Mutex<Vec<OverdueReport>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<OverdueReport> {
        self.reports.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn overdue(&self, report: &OverdueReport) {
        self.reports.lock().await.push(report.clone());
    }
}
