//! Error types for the enrichment pipeline.
//!
//! This module defines the central [`Error`] enum, which captures every
//! condition that aborts a pipeline run, plus two narrower error types:
//!
//! - [`DatabaseError`]: why a geolocation range table could not be loaded.
//! - [`RecordError`]: why a single record could not be rewritten. These are
//!   recoverable; the worker emits the line unchanged and keeps going.
//!
//! ## Error Cases
//! - `Config`: the pipeline configuration failed validation.
//! - `Input`: reading the input stream failed for a reason other than EOF.
//! - `Database`: the geolocation database could not be opened or parsed.
//! - `ShardCreate` / `ShardWrite`: a worker's output shard could not be
//!   created or written.
//! - `QueueClosed`: every worker went away before the reader finished.
//! - `WorkerPanicked`: a worker task panicked or was aborted.
//! - `Cancelled`: the run was cancelled because another component failed.

use std::{io, path::PathBuf};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for a pipeline run. Every variant is fatal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration is invalid.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Reading the input stream failed.
    #[error("Failed to read input: {0}")]
    Input(#[source] io::Error),

    /// The geolocation database could not be loaded.
    #[error("Could not open geolocation database {}: {source}", .path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: DatabaseError,
    },

    /// A worker's output shard could not be created.
    #[error("Could not create shard {}: {source}", .path.display())]
    ShardCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Appending to, or flushing, a worker's output shard failed.
    #[error("Could not write shard {}: {source}", .path.display())]
    ShardWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The distribution queue has no receivers left.
    #[error("Distribution queue closed before input was exhausted")]
    QueueClosed,

    /// A worker task panicked or was aborted by the runtime.
    #[error("Worker {worker_id} panicked")]
    WorkerPanicked { worker_id: usize },

    /// The run was cancelled after another component failed.
    #[error("Pipeline cancelled")]
    Cancelled,
}

/// Reasons a geolocation range table fails to load.
#[derive(thiserror::Error, Debug)]
pub enum DatabaseError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// A row could not be turned into an address range.
    #[error("line {line}: {reason}")]
    InvalidRow { line: u64, reason: String },

    /// Two ranges claim the same address.
    #[error("ranges {first} and {second} overlap")]
    Overlap { first: String, second: String },
}

/// A record that cannot be rewritten.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("field index {index} out of range for a record with {fields} fields")]
    FieldOutOfRange { index: usize, fields: usize },
}
