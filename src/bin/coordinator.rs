use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use mapred_rs::mr::driver::{JobConfig, JobDriver};
use tracing::info;

/// MapReduce coordinator: segments the input directory and serves map and
/// reduce tasks to workers until the job completes.
#[derive(Parser)]
#[command(name = "coordinator", version, about = "MapReduce coordinator")]
struct Cli {
    /// Directory of input text files.
    input_dir: PathBuf,
    /// Reduce outputs land at <prefix>-<i> ("mr-out" is conventional).
    output_file_prefix: String,
    /// Advisory mapper count; segments drive map parallelism.
    num_mappers: usize,
    /// Number of reduce tasks.
    num_reducers: usize,
    /// Address the RPC server binds to.
    #[arg(long, default_value = "0.0.0.0:8995")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        input_dir = %cli.input_dir.display(),
        num_mappers = cli.num_mappers,
        num_reducers = cli.num_reducers,
        "starting mapreduce job"
    );

    let mut config = JobConfig::new(
        cli.input_dir,
        cli.output_file_prefix,
        cli.num_mappers,
        cli.num_reducers,
    );
    config.listen_addr = cli.listen;

    let start = Instant::now();
    let job = JobDriver::start(config).await?;
    job.wait().await?;
    info!(elapsed = ?start.elapsed(), "mapreduce job complete");
    Ok(())
}
