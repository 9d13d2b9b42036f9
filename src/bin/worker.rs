use std::net::SocketAddr;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use mapred_rs::mr::plugin;
use mapred_rs::mr::rpc::CoordinatorClient;
use mapred_rs::mr::worker::Worker;
use tarpc::{client, tokio_serde::formats::Json};
use tracing::info;

/// MapReduce worker: polls the coordinator for tasks and runs the named
/// application against the shared filesystem.
#[derive(Parser)]
#[command(name = "worker", version, about = "MapReduce worker")]
struct Cli {
    /// Non-empty id, unique across workers attached to one coordinator.
    worker_id: String,
    /// Name of the map/reduce application to run (e.g. "wc").
    plugin: String,
    /// Coordinator RPC address.
    #[arg(long, default_value = "0.0.0.0:8995")]
    coordinator: SocketAddr,
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
    if cli.worker_id.is_empty() {
        bail!("worker id must be non-empty");
    }
    let Some(app) = plugin::lookup(&cli.plugin) else {
        bail!(
            "unknown application {:?}; available: {}",
            cli.plugin,
            plugin::names().join(", ")
        );
    };

    let transport = tarpc::serde_transport::tcp::connect(cli.coordinator, Json::default)
        .await
        .with_context(|| format!("connect to coordinator at {}", cli.coordinator))?;
    let client = CoordinatorClient::new(client::Config::default(), transport).spawn();
    info!(worker = %cli.worker_id, application = app.name, "worker connected");

    let worker = Worker::new(cli.worker_id, app);
    let completed = worker.run(&client).await?;
    info!(tasks = completed, "worker exiting");
    Ok(())
}
