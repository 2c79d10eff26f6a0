//! End-to-end pipeline driver.
//!
//! [`run`] wires the pieces together: the current task reads batches and feeds
//! the queue while the [`WorkerPool`] drains it. The run finishes once the
//! queue is closed and every worker has flushed its shard.

use crate::{
    batch::{BatchReader, ReadStatus},
    config::PipelineConfig,
    error::{Error, Result},
    lookup::CountryLookup,
    pool::WorkerPool,
    queue::{self, BatchSender},
    worker::WorkerReport,
};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

/// Totals for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Non-empty batches handed to the workers.
    pub batches: u64,
    pub lines: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub malformed: u64,
    /// Per-worker reports, ordered by worker id.
    pub workers: Vec<WorkerReport>,
}

impl PipelineSummary {
    fn from_reports(batches: u64, workers: Vec<WorkerReport>) -> Self {
        let mut summary = Self {
            batches,
            ..Self::default()
        };
        for report in &workers {
            summary.lines += report.lines;
            summary.resolved += report.resolved;
            summary.unresolved += report.unresolved;
            summary.malformed += report.malformed;
        }
        summary.workers = workers;
        summary
    }
}

/// Enriches every line of `input` and writes it to exactly one shard under
/// `config.output_dir`.
///
/// # Errors
///
/// Every error is fatal for the run:
/// - [`Error::Config`] if `config` is invalid.
/// - [`Error::ShardCreate`] if a shard cannot be created.
/// - [`Error::Input`] if reading `input` fails.
/// - [`Error::ShardWrite`] or [`Error::WorkerPanicked`] if a worker fails.
pub async fn run<R, L>(
    config: &PipelineConfig,
    input: R,
    lookup: Arc<L>,
) -> Result<PipelineSummary>
where
    R: AsyncBufRead + Unpin,
    L: CountryLookup + ?Sized + 'static,
{
    config.validate()?;

    let shutdown = CancellationToken::new();
    let (sender, receiver) = queue::bounded(config.queue_depth);
    let pool = WorkerPool::start(config, lookup, receiver, shutdown.clone()).await?;

    let mut reader = BatchReader::new(input, config.batch_size);
    let feeding = async {
        let fed = feed(&mut reader, sender, &shutdown).await;
        if let Err(_e) = &fed {
            #[cfg(feature = "tracing")]
            tracing::debug!("Reader stopped early: {_e}");
            shutdown.cancel();
        }
        fed
    };

    // The pool is joined while the reader runs so that a failed worker stops
    // the reader instead of waiting for the end of input.
    let (fed, joined) = tokio::join!(feeding, pool.join());

    match (fed, joined) {
        (Ok(batches), Ok(reports)) => {
            let summary = PipelineSummary::from_reports(batches, reports);
            debug_assert_eq!(summary.lines, reader.lines_read());
            Ok(summary)
        }
        // A cancelled reader or a closed queue only means a worker failed
        // first; report the worker's error.
        (Err(Error::Cancelled | Error::QueueClosed), Err(e)) | (Err(e), _) | (Ok(_), Err(e)) => {
            Err(e)
        }
    }
}

/// Moves batches from the reader into the queue until input is exhausted, then
/// closes the queue. Returns the number of batches sent.
async fn feed<R>(
    reader: &mut BatchReader<R>,
    sender: BatchSender,
    shutdown: &CancellationToken,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut batches = 0;

    loop {
        let (batch, status) = tokio::select! {
            read = reader.read_batch() => read?,
            () = shutdown.cancelled() => return Err(Error::Cancelled),
        };

        if !batch.is_empty() {
            tokio::select! {
                sent = sender.send(batch) => sent?,
                () = shutdown.cancelled() => return Err(Error::Cancelled),
            }
            batches += 1;
        }

        if status == ReadStatus::EndOfInput {
            break;
        }
    }

    sender.close();
    Ok(batches)
}
