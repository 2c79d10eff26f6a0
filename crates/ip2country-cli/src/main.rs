//! `ip2country`: reads `|`-delimited records from stdin, replaces the address
//! field with its country code and writes the records across one shard file
//! per worker.
//!
//! ```bash
//! zcat access.log.gz | ip2country -d country.csv -o /data/geo -c 3 -r 8
//! ```
//!
//! Exits 0 once every shard is flushed. Any configuration, database, shard or
//! input error aborts the run with a message on stderr and a nonzero status.

mod config;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use config::{AppConfig, CliArgs};
use ip2country::RangeTable;
use std::sync::Arc;
use tokio::io::BufReader;

const STDIN_BUFFER_BYTES: usize = 256 * 1024;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    telemetry::init_logging()?;
    log_startup_info(&config);

    let database = RangeTable::load(&config.database)?;
    #[cfg(feature = "tracing")]
    tracing::info!("Loaded {} address ranges", database.len());

    let input = BufReader::with_capacity(STDIN_BUFFER_BYTES, tokio::io::stdin());
    let _summary = ip2country::run(&config.pipeline, input, Arc::new(database))
        .await
        .context("ip2country run aborted")?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Wrote {} lines in {} batches across {} shards ({} resolved, {} unknown, {} malformed)",
        _summary.lines,
        _summary.batches,
        _summary.workers.len(),
        _summary.resolved,
        _summary.unresolved,
        _summary.malformed
    );

    Ok(())
}

fn log_startup_info(_config: &AppConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting ip2country with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting ip2country with {} workers, writing to {}",
            _config.pipeline.workers,
            _config.pipeline.output_dir.display()
        );
    }
}
