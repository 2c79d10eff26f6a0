use crate::error::{Error, Result};
use std::path::PathBuf;

/// Maximum number of lines the reader places in a single batch.
pub const BATCH_SIZE: usize = 1000;

/// Number of enrichment workers (and therefore output shards) by default.
pub const DEFAULT_WORKERS: usize = 3;

/// File name prefix for output shards.
pub const DEFAULT_PREFIX: &str = "out";

/// Batches that may wait in the distribution queue before the reader blocks.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Field separator for input and output records.
pub const DELIMITER: u8 = b'|';

/// Written in place of the address when no country is known for it.
pub const UNKNOWN_COUNTRY: &str = "--";

/// Immutable settings for one pipeline run.
///
/// Built once at startup and shared by reference with the reader, the pool and
/// every worker. Nothing mutates it after [`PipelineConfig::validate`] passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory that receives one shard file per worker.
    pub output_dir: PathBuf,
    /// Shard file name prefix; shard `i` is `<output_dir>/<prefix><i>`.
    pub prefix: String,
    /// Worker pool size.
    pub workers: usize,
    /// Zero-based index of the field holding the IP address.
    pub field_index: usize,
    /// Maximum lines per batch.
    pub batch_size: usize,
    /// Capacity of the distribution queue, in batches.
    pub queue_depth: usize,
}

impl PipelineConfig {
    /// Creates a configuration with default prefix, pool size, batch size and
    /// queue depth.
    pub fn new(output_dir: impl Into<PathBuf>, field_index: usize) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: DEFAULT_PREFIX.to_owned(),
            workers: DEFAULT_WORKERS,
            field_index,
            batch_size: BATCH_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub const fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Path of the shard owned by `worker_id`.
    pub fn shard_path(&self, worker_id: usize) -> PathBuf {
        self.output_dir.join(format!("{}{}", self.prefix, worker_id))
    }

    /// Checks the invariants the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the pool size, batch size or queue depth is
    /// zero, or if the prefix is empty or contains a path separator.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(config_error("worker pool size must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch size must be greater than 0"));
        }
        if self.queue_depth == 0 {
            return Err(config_error("queue depth must be greater than 0"));
        }
        if self.prefix.is_empty() {
            return Err(config_error("output prefix must not be empty"));
        }
        if self.prefix.contains(std::path::is_separator) {
            return Err(config_error(format!(
                "output prefix {:?} must not contain a path separator",
                self.prefix
            )));
        }
        Ok(())
    }
}

fn config_error(reason: impl Into<String>) -> Error {
    Error::Config {
        reason: reason.into(),
    }
}
