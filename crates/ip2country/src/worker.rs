//! Enrichment worker lifecycle.
//!
//! Each worker is a long-running Tokio task that owns one output shard and a
//! handle to the shared lookup table. It takes batches off the shared queue,
//! rewrites every line and appends the result to its shard, and exits when
//! either:
//! - The queue is closed and drained,
//! - The shared cancellation token is cancelled, or
//! - Writing its shard fails, in which case it cancels the token itself so the
//!   rest of the pipeline stops too.
//!
//! The shard is flushed on every exit path.

use crate::{
    batch::Batch,
    error::{Error, Result},
    lookup::CountryLookup,
    queue::BatchReceiver,
    record::{Rewrite, rewrite_line},
    shard::ShardWriter,
};
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;

/// What one worker did over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// The shard this worker owned.
    pub path: PathBuf,
    pub batches: u64,
    pub lines: u64,
    /// Lines whose address mapped to a country.
    pub resolved: u64,
    /// Lines whose address got the unknown-country sentinel.
    pub unresolved: u64,
    /// Lines with too few fields, written through unchanged.
    pub malformed: u64,
    /// Bytes written to the shard.
    pub bytes: u64,
}

/// Runs one worker until the queue is drained or the run is cancelled.
///
/// # Arguments
/// - `worker_id`: Index of this worker, used in logs and reports.
/// - `receiver`: Shared receiving half of the distribution queue.
/// - `shard`: Output file exclusively owned by this worker.
/// - `lookup`: Geolocation lookup handle.
/// - `field_index`: Zero-based index of the address field.
/// - `shutdown`: Token shared by the whole pipeline.
///
/// # Errors
///
/// Returns [`Error::ShardWrite`] if the shard cannot be written or flushed,
/// and [`Error::Cancelled`] if the run was cancelled elsewhere.
pub async fn worker_loop<L>(
    worker_id: usize,
    receiver: BatchReceiver,
    mut shard: ShardWriter,
    lookup: Arc<L>,
    field_index: usize,
    shutdown: CancellationToken,
) -> Result<WorkerReport>
where
    L: CountryLookup + ?Sized,
{
    #[cfg(feature = "tracing")]
    tracing::debug!("Worker {worker_id} started, writing {}", shard.path().display());

    let mut report = WorkerReport {
        worker_id,
        path: shard.path().to_path_buf(),
        ..WorkerReport::default()
    };
    let mut buf = Vec::new();

    let outcome = loop {
        let batch = tokio::select! {
            batch = receiver.recv() => batch,
            () = shutdown.cancelled() => break Err(Error::Cancelled),
        };
        let Some(batch) = batch else {
            break Ok(());
        };

        buf.clear();
        rewrite_batch(&batch, field_index, &*lookup, &mut buf, &mut report);
        if let Err(e) = shard.write_all(&buf).await {
            break Err(e);
        }
    };

    report.bytes = shard.bytes();
    let flushed = shard.finish().await;
    let result = outcome.and(flushed).map(|_| report);

    match &result {
        Ok(_report) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "Worker {worker_id} stopped after {} batches, {} lines ({} resolved, {} unknown, {} malformed)",
                _report.batches,
                _report.lines,
                _report.resolved,
                _report.unresolved,
                _report.malformed
            );
        }
        Err(Error::Cancelled) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker_id} stopped via cancellation token");
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker {worker_id} failed: {_e}");
            shutdown.cancel();
        }
    }

    result
}

/// Rewrites every line of `batch` into `out`, tallying outcomes in `report`.
///
/// Malformed lines are copied through unchanged.
fn rewrite_batch<L>(
    batch: &Batch,
    field_index: usize,
    lookup: &L,
    out: &mut Vec<u8>,
    report: &mut WorkerReport,
) where
    L: CountryLookup + ?Sized,
{
    for line in &batch.lines {
        match rewrite_line(line, field_index, lookup, out) {
            Ok(Rewrite::Resolved) => report.resolved += 1,
            Ok(Rewrite::Unresolved) => report.unresolved += 1,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                {
                    if report.malformed == 0 {
                        tracing::warn!(
                            "Worker {}: batch {} has a malformed record ({_e}), passing it through unchanged",
                            report.worker_id,
                            batch.seq
                        );
                    } else {
                        tracing::debug!(
                            "Worker {}: batch {} malformed record: {_e}",
                            report.worker_id,
                            batch.seq
                        );
                    }
                }
                report.malformed += 1;
                out.extend_from_slice(line);
            }
        }
    }
    report.batches += 1;
    report.lines += batch.len() as u64;
}
