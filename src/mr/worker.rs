//! Worker runtime: the per-task loop pulling assignments, running the user
//! application, and reporting completions.
//!
//! One worker handles one task at a time; emission buffers are allocated at
//! task start and released at task end, so a process can run many tasks
//! sequentially without leakage.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::Duration;

use anyhow::Context as _;
use tarpc::context;
use tokio::time::sleep;
use tracing::info;

use crate::mr::plugin::Application;
use crate::mr::rpc::{CoordinatorClient, Status, TaskAssignment, TaskKind};

/// Backoff between polls while no task is available.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One key/value emission.
pub type Record = (Vec<u8>, Vec<u8>);

pub struct Worker {
    id: String,
    app: &'static Application,
}

impl Worker {
    pub fn new(id: impl Into<String>, app: &'static Application) -> Self {
        Self { id: id.into(), app }
    }

    /// Pull and execute tasks until the coordinator goes away. Returns the
    /// number of tasks completed.
    ///
    /// The coordinator closes its listener only once the job has finished, so
    /// a transport failure on `assign` is the shutdown signal.
    pub async fn run(&self, client: &CoordinatorClient) -> anyhow::Result<usize> {
        let mut completed = 0usize;
        loop {
            let reply = match client.assign(context::current(), self.id.clone()).await {
                Ok(reply) => reply,
                Err(err) => {
                    info!(worker = %self.id, error = %err, "coordinator gone; shutting down");
                    return Ok(completed);
                }
            };
            match reply {
                Ok(task) => {
                    info!(
                        worker = %self.id,
                        task = %task.taskname,
                        inputs = task.input_filenames.len(),
                        "task assigned"
                    );
                    self.execute(&task)?;
                    client
                        .complete(
                            context::current(),
                            self.id.clone(),
                            task.taskname.to_string(),
                            task.output_filename.clone(),
                        )
                        .await
                        .context("report task completion")??;
                    completed += 1;
                }
                Err(Status::Unavailable) => sleep(POLL_INTERVAL).await,
                Err(status) => return Err(status).context("task assignment rejected"),
            }
        }
    }

    /// Run one task end to end. The output file is flushed and closed before
    /// this returns, so completion is only reported for durable output.
    fn execute(&self, task: &TaskAssignment) -> anyhow::Result<()> {
        let input = read_concatenated(&task.input_filenames)?;
        let records = match task.taskname {
            TaskKind::Map => self.run_map(&input),
            TaskKind::Reduce => self.run_reduce(&input)?,
        };
        write_records(&task.output_filename, &records)?;
        info!(
            worker = %self.id,
            output = %task.output_filename,
            records = records.len(),
            "task output written"
        );
        Ok(())
    }

    /// Map: feed the whole input to the user function and keep the emissions
    /// in emission order. No sort at the map stage.
    fn run_map(&self, input: &[u8]) -> Vec<Record> {
        let mut records = Vec::new();
        (self.app.map)(input, &mut |key, value| {
            records.push((key.to_vec(), value.to_vec()))
        });
        records
    }

    /// Reduce: parse the concatenated intermediate records, stable-sort by
    /// key, and feed each run of equal keys to the user function.
    fn run_reduce(&self, input: &[u8]) -> anyhow::Result<Vec<Record>> {
        let mut pairs = parse_records(input)?;
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut records = Vec::new();
        let mut start = 0;
        while start < pairs.len() {
            let mut end = start + 1;
            while end < pairs.len() && pairs[end].0 == pairs[start].0 {
                end += 1;
            }
            let values: Vec<&[u8]> = pairs[start..end]
                .iter()
                .map(|(_, value)| value.as_slice())
                .collect();
            (self.app.reduce)(pairs[start].0.as_slice(), &values, &mut |key, value| {
                records.push((key.to_vec(), value.to_vec()))
            });
            start = end;
        }
        Ok(records)
    }
}

/// Read every input file and concatenate the bytes in reply order.
fn read_concatenated(paths: &[String]) -> anyhow::Result<Vec<u8>> {
    let mut input = Vec::new();
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("read task input {path}"))?;
        input.extend_from_slice(&bytes);
    }
    Ok(input)
}

/// Split intermediate input on newlines, then each record on its first tab.
fn parse_records(input: &[u8]) -> anyhow::Result<Vec<Record>> {
    input
        .split(|&byte| byte == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| {
            let tab = line
                .iter()
                .position(|&byte| byte == b'\t')
                .context("intermediate record missing tab separator")?;
            Ok((line[..tab].to_vec(), line[tab + 1..].to_vec()))
        })
        .collect()
}

/// Write records as `key\tvalue\n` lines.
fn write_records(path: &str, records: &[Record]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("create task output {path}"))?;
    let mut out = BufWriter::new(file);
    for (key, value) in records {
        out.write_all(key)?;
        out.write_all(b"\t")?;
        out.write_all(value)?;
        out.write_all(b"\n")?;
    }
    out.flush().with_context(|| format!("flush task output {path}"))
}
