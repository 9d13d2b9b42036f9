//! Job lifecycle: segment the input, build the task catalog, host the
//! coordinator RPC server, and tear down once every reduce task completes.

use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use futures::StreamExt;
use tarpc::server::incoming::Incoming;
use tarpc::server::BaseChannel;
use tarpc::tokio_serde::formats::Json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

use crate::mr::coordinator::CoordinatorServer;
use crate::mr::registry::TaskRegistry;
use crate::mr::rpc::Coordinator;
use crate::mr::scheduler::Scheduler;
use crate::mr::segmenter;

/// Segment size cap, fixed at 16 MiB.
pub const MAX_SEGMENT_SIZE: usize = 16 * 1024 * 1024;
/// Default coordinator RPC port.
pub const DEFAULT_PORT: u16 = 8995;
/// Prefix of map intermediate files.
pub const INTERMEDIATE_PREFIX: &str = "mr-int";
/// Conventional prefix of reduce output files.
pub const OUTPUT_PREFIX: &str = "mr-out";

/// How often the monitor re-checks the finished flag.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_dir: PathBuf,
    /// Reduce outputs land at `<output_prefix>-<i>`.
    pub output_prefix: String,
    /// Advisory only; segments, not workers, drive map parallelism.
    pub num_mappers: usize,
    pub num_reducers: usize,
    pub max_segment_size: usize,
    pub listen_addr: SocketAddr,
    /// Directory holding segment, intermediate, and output files.
    pub work_dir: PathBuf,
}

impl JobConfig {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_prefix: impl Into<String>,
        num_mappers: usize,
        num_reducers: usize,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_prefix: output_prefix.into(),
            num_mappers,
            num_reducers,
            max_segment_size: MAX_SEGMENT_SIZE,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            work_dir: PathBuf::from("."),
        }
    }
}

pub struct JobDriver;

impl JobDriver {
    /// Materialize segments, build the task catalog, and start serving.
    ///
    /// All file writes happen here, before the RPC server accepts its first
    /// request.
    pub async fn start(config: JobConfig) -> anyhow::Result<RunningJob> {
        let segments = segmenter::scan(&config.input_dir, config.max_segment_size)?;
        info!(
            segments = segments.len(),
            advisory_mappers = config.num_mappers,
            num_reducers = config.num_reducers,
            "input segmented"
        );

        let segments_dir = config.work_dir.join(segmenter::SEGMENTS_DIR);
        let segment_paths = segmenter::materialize(&segments, &segments_dir)?;

        let intermediates: Vec<String> = (0..segment_paths.len())
            .map(|id| {
                config
                    .work_dir
                    .join(format!("{INTERMEDIATE_PREFIX}-{id}"))
                    .display()
                    .to_string()
            })
            .collect();
        let outputs: Vec<String> = (0..config.num_reducers)
            .map(|id| {
                config
                    .work_dir
                    .join(format!("{}-{id}", config.output_prefix))
                    .display()
                    .to_string()
            })
            .collect();
        let registry = TaskRegistry::new(segment_paths, intermediates, outputs);
        let scheduler = Arc::new(Mutex::new(Scheduler::new(registry)));

        let listener = tarpc::serde_transport::tcp::listen(config.listen_addr, Json::default)
            .await
            .with_context(|| format!("bind coordinator listener on {}", config.listen_addr))?;
        let local_addr = listener.local_addr();
        info!(addr = %local_addr, "coordinator rpc server serving");

        let server = CoordinatorServer::new(Arc::clone(&scheduler));
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let accept_loop = tokio::spawn(async move {
            let serving = listener
                // Accept valid connections, ignore the rest.
                .filter_map(|conn| async { conn.ok() })
                .map(BaseChannel::with_defaults)
                .execute(server.serve());
            tokio::select! {
                _ = serving => {}
                _ = shutdown_rx.changed() => {}
            }
        });

        Ok(RunningJob {
            scheduler,
            local_addr,
            shutdown,
            accept_loop,
            segments_dir,
        })
    }
}

/// A started job: the RPC server is accepting and the monitor has not yet
/// observed completion.
pub struct RunningJob {
    scheduler: Arc<Mutex<Scheduler>>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_loop: JoinHandle<()>,
    segments_dir: PathBuf,
}

impl RunningJob {
    /// The address the RPC server actually bound (port 0 resolves here).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    /// Block until every reduce task has completed, then shut the server down
    /// and remove the segments directory. Intermediate and output files are
    /// retained.
    pub async fn wait(self) -> anyhow::Result<()> {
        loop {
            let finished = self.scheduler.lock().unwrap().finished();
            if finished {
                break;
            }
            sleep(MONITOR_INTERVAL).await;
        }
        info!("job finished; shutting down rpc server");
        let _ = self.shutdown.send(true);
        self.accept_loop.await.context("join rpc accept loop")?;

        match fs::remove_dir_all(&self.segments_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!(
                        "remove segments directory {}",
                        self.segments_dir.display()
                    )
                });
            }
        }
        Ok(())
    }
}
