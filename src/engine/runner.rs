//! Batch check runner.
//!
//! One `run_once` call drains the due-alert set: each alert is processed on
//! its own task, at most `workers` in flight at a time, and a panic in one
//! alert's cycle is caught at the task boundary so the batch always runs to
//! completion. Only a failure to list the due alerts aborts the run — there
//! is nothing to iterate.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::engine::processor::AlertProcessor;
use crate::store::AlertStore;
use crate::types::{CheckCycleResult, RunSummary};

pub struct CheckRunner {
    store: Arc<dyn AlertStore>,
    processor: Arc<AlertProcessor>,
    workers: usize,
}

impl CheckRunner {
    pub fn new(store: Arc<dyn AlertStore>, processor: Arc<AlertProcessor>, workers: usize) -> Self {
        Self {
            store,
            processor,
            workers: workers.max(1),
        }
    }

    /// Run one full check batch over the alerts due at call time.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let clock = std::time::Instant::now();

        let due = self
            .store
            .get_due_alerts(started_at)
            .await
            .context("Failed to fetch due alerts")?;

        let mut summary = RunSummary::new(started_at, due.len());
        if due.is_empty() {
            summary.elapsed = clock.elapsed();
            info!("No alerts due");
            return Ok(summary);
        }

        info!(due = due.len(), workers = self.workers, "Processing due alerts");

        let results: Vec<CheckCycleResult> = stream::iter(due.into_iter().map(|alert| {
            let processor = Arc::clone(&self.processor);
            async move {
                let alert_id = alert.id;
                // The spawn boundary is what keeps one alert's panic from
                // taking down the batch.
                match tokio::spawn(async move { processor.process(alert, started_at).await }).await
                {
                    Ok(result) => result,
                    Err(e) => {
                        error!(alert_id = %alert_id, error = %e, "Alert processing task faulted");
                        CheckCycleResult::faulted(alert_id, e.to_string())
                    }
                }
            }
        }))
        .buffer_unordered(self.workers)
        .collect()
        .await;

        for result in &results {
            if result.outcome.is_error() {
                warn!(
                    alert_id = %result.alert_id,
                    outcome = %result.outcome,
                    error = result.error.as_deref().unwrap_or("-"),
                    "Alert check ended in error"
                );
            }
            summary.record(result);
        }

        summary.elapsed = clock.elapsed();
        info!(
            due = summary.due,
            processed = summary.processed,
            notified = summary.notified,
            no_deals = summary.no_deals,
            errored = summary.errored(),
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Check run complete"
        );

        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
