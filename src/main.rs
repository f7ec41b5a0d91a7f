//! Singer S3 Target
//!
//! Reads Singer RECORD messages from stdin, batches them per stream and
//! writes each batch as one object under `<stream>/<timestamp>` in the
//! configured bucket. Emits a STATE message on stdout after every write.
//!
//! ## Usage
//!
//! ```text
//! tap-something | singer-s3-target --config config.json
//! ```
//!
//! ## Config file
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | bucket_name | - | Destination bucket (required) |
//! | buffer_size | 1000 | Records per stream per object |
//! | store | s3 | s3, local_fs or in_memory |
//! | local_path | - | Base directory for local_fs |
//! | region | AWS_REGION | S3 region override |
//! | endpoint | - | S3-compatible endpoint (MinIO) |
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | AWS_ACCESS_KEY_ID | - | S3 credentials |
//! | AWS_SECRET_ACCESS_KEY | - | S3 credentials |
//! | AWS_REGION | - | S3 region |
//! | RUST_LOG | info | Log filter (logs go to stderr) |
//! | SINGER_S3_LOG_FORMAT | text | text or json |

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use singer_s3_target::observability::{init_tracing, LogConfig};
use singer_s3_target::streaming::{create_store, LineProcessor, ProductionClock, TargetConfig};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(
    name = "singer-s3-target",
    version,
    about = "Singer target loading records into an S3 bucket"
)]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&LogConfig::from_env());

    let config = TargetConfig::load(&args.config).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    info!(
        bucket = %config.bucket_name,
        buffer_size = config.buffer_size,
        store = ?config.store,
        "Starting target"
    );

    let store = create_store(&config)?;

    // Make sure the bucket exists and is reachable before reading any input
    match store.bucket_exists(&config.bucket_name).await {
        Ok(true) => {}
        Ok(false) => {
            error!(bucket = %config.bucket_name, "Bucket does not exist");
            return Err(format!("bucket {} does not exist", config.bucket_name).into());
        }
        Err(e) => {
            error!(bucket = %config.bucket_name, error = %e, "Bucket is not accessible");
            return Err(e.into());
        }
    }

    let mut processor =
        LineProcessor::from_config(&config, store, ProductionClock::new(), std::io::stdout());

    let summary = processor
        .run(BufReader::new(tokio::io::stdin()))
        .await
        .map_err(|e| {
            error!(error = %e, "Run aborted");
            e
        })?;

    debug!(?summary, "Exiting normally");
    Ok(())
}
