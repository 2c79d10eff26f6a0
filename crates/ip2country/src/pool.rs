//! Fixed-size pool of enrichment workers and the completion barrier that joins
//! them.
//!
//! This module defines the [`WorkerPool`] struct, which owns one Tokio task
//! per worker. All workers pull from the same [`BatchReceiver`], so the first
//! idle worker gets the next batch. The pool:
//!
//! - Creates every shard file before any worker starts, so a failed create
//!   aborts the run before processing begins.
//! - Hands each worker exclusive ownership of its shard.
//! - Joins every task on [`WorkerPool::join`], which returns only after all
//!   shards are flushed.

use crate::{
    config::PipelineConfig,
    error::{Error, Result},
    lookup::CountryLookup,
    queue::BatchReceiver,
    shard::ShardWriter,
    worker::{WorkerReport, worker_loop},
};
use futures::{StreamExt, stream::FuturesUnordered};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A running set of workers draining one distribution queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<Result<WorkerReport>>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Creates the shards and spawns `config.workers` worker tasks.
    ///
    /// The pool keeps no receiver of its own; once the workers exit, sends on
    /// the queue fail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShardCreate`] if any shard cannot be created. No worker
    /// is spawned in that case.
    pub async fn start<L>(
        config: &PipelineConfig,
        lookup: Arc<L>,
        receiver: BatchReceiver,
        shutdown: CancellationToken,
    ) -> Result<Self>
    where
        L: CountryLookup + ?Sized + 'static,
    {
        let mut shards = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            shards.push(ShardWriter::create(config.shard_path(worker_id)).await?);
        }

        let handles = shards
            .into_iter()
            .enumerate()
            .map(|(worker_id, shard)| {
                tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    shard,
                    Arc::clone(&lookup),
                    config.field_index,
                    shutdown.clone(),
                ))
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!("Started {} workers", config.workers);

        Ok(Self { handles, shutdown })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to finish and returns their reports, ordered by
    /// worker id.
    ///
    /// Workers are collected as they complete. The first failure cancels the
    /// shared token right away, so the reader and the remaining workers stop
    /// instead of draining the rest of the input.
    ///
    /// # Errors
    ///
    /// If any worker failed, returns the first failure that is not
    /// [`Error::Cancelled`] (a cancelled worker is a consequence of some other
    /// failure). A panicked worker yields [`Error::WorkerPanicked`].
    pub async fn join(self) -> Result<Vec<WorkerReport>> {
        let mut pending: FuturesUnordered<_> = self
            .handles
            .into_iter()
            .enumerate()
            .map(|(worker_id, handle)| async move { (worker_id, handle.await) })
            .collect();

        let mut reports = Vec::with_capacity(pending.len());
        let mut failure = None;

        while let Some((worker_id, joined)) = pending.next().await {
            let result = joined.unwrap_or_else(|_e| {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {worker_id} did not complete: {_e}");
                Err(Error::WorkerPanicked { worker_id })
            });

            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    self.shutdown.cancel();
                    if matches!(failure, None | Some(Error::Cancelled)) {
                        failure = Some(e);
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                reports.sort_unstable_by_key(|report| report.worker_id);
                Ok(reports)
            }
        }
    }
}
