//! # ip2country
//!
//! A concurrent batch pipeline that replaces an IP address column in
//! `|`-delimited records with the address's country code, writing the results
//! across a fixed set of output shards.
//!
//! ## Flow
//!
//! ```text
//! input ──► BatchReader ──► queue (bounded) ──► worker 0 ──► <dir>/<prefix>0
//!                                         ├───► worker 1 ──► <dir>/<prefix>1
//!                                         └───► worker N ──► <dir>/<prefix>N
//! ```
//!
//! - [`batch`]: splits the input into batches of at most
//!   [`config::BATCH_SIZE`] lines.
//! - [`queue`]: single-producer, multi-consumer hand-off with backpressure.
//! - [`worker`]: rewrites each line and appends it to the worker's own shard.
//! - [`pool`]: starts the workers and joins them before the run completes.
//! - [`pipeline`]: drives a whole run.
//!
//! Each input line is written exactly once, to exactly one shard. Order is
//! preserved within a batch, but which shard a batch lands in is not
//! deterministic.
//!
//! ## Example
//!
//! ```no_run
//! use ip2country::{PipelineConfig, RangeTable};
//! use std::sync::Arc;
//!
//! # async fn demo() -> ip2country::Result<()> {
//! let config = PipelineConfig::new("/tmp/geo", 3).with_workers(4);
//! let database = Arc::new(RangeTable::load("/var/lib/geo/country.csv")?);
//! let input = tokio::io::BufReader::new(tokio::io::stdin());
//!
//! let summary = ip2country::run(&config, input, database).await?;
//! println!("{} lines, {} unknown", summary.lines, summary.unresolved);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod database;
pub mod error;
pub mod lookup;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod record;
pub mod shard;
pub mod worker;

pub use batch::{Batch, BatchReader, ReadStatus};
pub use config::{BATCH_SIZE, PipelineConfig, UNKNOWN_COUNTRY};
pub use database::RangeTable;
pub use error::{DatabaseError, Error, RecordError, Result};
pub use lookup::CountryLookup;
pub use pipeline::{PipelineSummary, run};
pub use pool::WorkerPool;
pub use worker::WorkerReport;
