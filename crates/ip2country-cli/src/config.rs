use anyhow::bail;
use clap::Parser;
use ip2country::{
    PipelineConfig,
    config::{BATCH_SIZE, DEFAULT_PREFIX, DEFAULT_QUEUE_DEPTH, DEFAULT_WORKERS},
};
use std::path::PathBuf;

/// Command-line arguments for the `ip2country` binary.
///
/// Every option can also be supplied through the environment variable named in
/// its help text, or through a `.env` file in the working directory.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ip2country",
    version,
    about = "Replace an IP address column in |-delimited stdin with its country code, sharding output across workers"
)]
pub struct CliArgs {
    /// Geolocation database: CSV rows of `start_ip,end_ip,country` or the
    /// legacy six-column GeoIP country layout.
    ///
    /// Environment variable: `IP2COUNTRY_DATABASE`
    #[arg(short = 'd', long, env = "IP2COUNTRY_DATABASE")]
    pub database: PathBuf,

    /// Directory that receives one output shard per worker.
    ///
    /// Environment variable: `IP2COUNTRY_OUTPUT_DIR`
    #[arg(short = 'o', long, env = "IP2COUNTRY_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Shard file name prefix; worker `i` writes `<output-dir>/<prefix><i>`.
    ///
    /// Environment variable: `IP2COUNTRY_PREFIX`
    #[arg(short = 'p', long, env = "IP2COUNTRY_PREFIX", default_value_t = String::from(DEFAULT_PREFIX))]
    pub prefix: String,

    /// Number of enrichment workers (and output shards).
    ///
    /// Environment variable: `IP2COUNTRY_WORKERS`
    #[arg(short = 'r', long, env = "IP2COUNTRY_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Zero-based index of the field holding the IP address.
    ///
    /// Environment variable: `IP2COUNTRY_COLUMN`
    #[arg(short = 'c', long, env = "IP2COUNTRY_COLUMN")]
    pub column: usize,

    /// Maximum number of lines handed to a worker at once.
    ///
    /// Environment variable: `IP2COUNTRY_BATCH_SIZE`
    #[arg(long, env = "IP2COUNTRY_BATCH_SIZE", default_value_t = BATCH_SIZE)]
    pub batch_size: usize,

    /// Batches that may wait for a worker before reading stdin pauses.
    ///
    /// Environment variable: `IP2COUNTRY_QUEUE_DEPTH`
    #[arg(long, env = "IP2COUNTRY_QUEUE_DEPTH", default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
}

/// Validated settings for one process run. Never mutated after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: PathBuf,
    pub pipeline: PipelineConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.database.as_os_str().is_empty() {
            bail!("IP2COUNTRY_DATABASE must not be empty");
        }
        if args.output_dir.as_os_str().is_empty() {
            bail!("IP2COUNTRY_OUTPUT_DIR must not be empty");
        }

        let pipeline = PipelineConfig::new(args.output_dir, args.column)
            .with_prefix(args.prefix)
            .with_workers(args.workers)
            .with_batch_size(args.batch_size)
            .with_queue_depth(args.queue_depth);
        pipeline.validate()?;

        Ok(Self {
            database: args.database,
            pipeline,
        })
    }
}
