//! Batched transfer engine.
//!
//! Rows stream from a forward-only cursor on the source and are inserted one
//! at a time on the target through a parameterized statement. Inserts are
//! grouped into transactions of [`batch_size`] rows; each commit emits a
//! [`ProgressSample`].
//!
//! A failed insert aborts the table. Batches committed before the failure stay
//! committed: there is no rollback across batches.

use std::time::{Duration, Instant};

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::traits::DdlExecutor;
use crate::error::{MigrateError, Result};

/// Largest number of rows committed in one transaction.
pub const MAX_BATCH_SIZE: u64 = 500;

/// Rows per transaction for a table of `estimated_rows` rows.
///
/// Roughly 1% of the table, at least 1 row and at most [`MAX_BATCH_SIZE`].
pub fn batch_size(estimated_rows: u64) -> u64 {
    (estimated_rows / 100).clamp(1, MAX_BATCH_SIZE)
}

/// Copy job for a single table.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Table name used in logs and errors.
    pub table: String,

    /// Query that reads every row from the source, columns in insert order.
    pub source_query: String,

    /// Parameterized insert with one positional parameter per column.
    pub insert_statement: String,

    /// Destination column names, in parameter order.
    pub columns: Vec<String>,

    /// Row count measured before the copy started.
    pub estimated_rows: u64,
}

/// Progress reported at every batch commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    pub table: String,
    pub rows_processed: u64,
    pub estimated_rows: u64,

    /// Share of the estimated rows processed, 0 to 100.
    pub percent: f64,

    pub rows_per_sec: f64,
    pub elapsed: Duration,

    /// Projected total duration: elapsed x estimated / processed.
    pub estimated_total: Duration,

    /// Projected remaining time.
    pub eta: Duration,
}

impl ProgressSample {
    fn new(table: &str, rows_processed: u64, estimated_rows: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let rows_per_sec = if secs > 0.0 {
            rows_processed as f64 / secs
        } else {
            rows_processed as f64
        };

        let percent = if estimated_rows == 0 {
            100.0
        } else {
            (rows_processed as f64 / estimated_rows as f64 * 100.0).min(100.0)
        };

        let estimated_total = if rows_processed == 0 || estimated_rows <= rows_processed {
            elapsed
        } else {
            elapsed.mul_f64(estimated_rows as f64 / rows_processed as f64)
        };

        Self {
            table: table.to_string(),
            rows_processed,
            estimated_rows,
            percent,
            rows_per_sec,
            elapsed,
            estimated_total,
            eta: estimated_total.saturating_sub(elapsed),
        }
    }
}

/// Statistics from a finished copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferStats {
    /// Total rows inserted.
    pub rows: u64,

    /// Number of commits issued, including the final one.
    pub commits: u64,

    pub batch_size: u64,
    pub elapsed: Duration,
}

/// Copies table contents between two executors.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    progress_tx: Option<mpsc::UnboundedSender<ProgressSample>>,
}

impl TransferEngine {
    /// Create a new transfer engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also send every progress sample to `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<ProgressSample>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Copy every row of `job.source_query` into the target.
    ///
    /// Text values have embedded NUL characters removed. The final, possibly
    /// partial, batch is always committed, so an empty table still costs one
    /// commit.
    pub async fn copy<S, T>(&self, source: &mut S, target: &mut T, job: &TransferJob) -> Result<TransferStats>
    where
        S: DdlExecutor + ?Sized,
        T: DdlExecutor + ?Sized,
    {
        let batch = batch_size(job.estimated_rows);
        info!(
            "{}: copying ~{} rows (batch size {})",
            job.table, job.estimated_rows, batch
        );

        let start = Instant::now();
        let mut stats = TransferStats {
            batch_size: batch,
            ..Default::default()
        };

        let mut cursor = source.open_cursor(&job.source_query).await?;
        target.begin_transaction().await?;

        while let Some(row) = cursor.next().await {
            let row_number = stats.rows + 1;
            let row = row.map_err(|e| MigrateError::transfer(&job.table, row_number, e.to_string()))?;

            if row.len() != job.columns.len() {
                return Err(MigrateError::transfer(
                    &job.table,
                    row_number,
                    format!("expected {} values, got {}", job.columns.len(), row.len()),
                ));
            }

            let values: Vec<_> = row.into_iter().map(|v| v.scrub_nul()).collect();
            target
                .execute_params(&job.insert_statement, &values)
                .await
                .map_err(|e| MigrateError::transfer(&job.table, row_number, e.to_string()))?;
            stats.rows = row_number;

            if stats.rows % batch == 0 {
                target.commit().await?;
                stats.commits += 1;
                target.begin_transaction().await?;
                self.report(ProgressSample::new(&job.table, stats.rows, job.estimated_rows, start.elapsed()));
            }
        }

        target.commit().await?;
        stats.commits += 1;
        stats.elapsed = start.elapsed();

        let rows_per_sec = if stats.elapsed.as_secs_f64() > 0.0 {
            (stats.rows as f64 / stats.elapsed.as_secs_f64()) as u64
        } else {
            0
        };
        info!(
            "{}: transferred {} rows in {:?} ({} rows/sec, {} commits)",
            job.table, stats.rows, stats.elapsed, rows_per_sec, stats.commits
        );

        Ok(stats)
    }

    fn report(&self, sample: ProgressSample) {
        info!(
            "{}: processed {:.1}% of {} rows, eta {:?}, {:.2} rows/sec",
            sample.table, sample.percent, sample.estimated_rows, sample.eta, sample.rows_per_sec
        );
        if let Some(tx) = &self.progress_tx {
            if tx.send(sample).is_err() {
                debug!("progress receiver dropped");
            }
        }
    }
}
