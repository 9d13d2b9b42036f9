//! Wire contract between the coordinator and its workers.
//!
//! Two request/reply operations: `assign` hands out a unit of work, and
//! `complete` retires one. The payloads are plain serde types; framing is
//! whatever transport the tarpc service is mounted on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two task categories of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => f.write_str("map"),
            TaskKind::Reduce => f.write_str("reduce"),
        }
    }
}

impl FromStr for TaskKind {
    type Err = Status;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(TaskKind::Map),
            "reduce" => Ok(TaskKind::Reduce),
            other => Err(Status::InvalidArgument(format!(
                "unknown taskname {other:?}"
            ))),
        }
    }
}

/// A unit of work handed to a worker by `assign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub taskname: TaskKind,
    /// Input files in the order the worker must concatenate them.
    pub input_filenames: Vec<String>,
    pub output_filename: String,
}

/// Error statuses surfaced to RPC callers; success is the `Ok` arm of the
/// reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Status {
    /// Malformed request: empty worker id or an unknown taskname.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A `complete` for a task the caller does not own.
    #[error("not found: {0}")]
    NotFound(String),
    /// No task is ready right now; back off and retry.
    #[error("no task available")]
    Unavailable,
}

/// RPC surface served by the coordinator.
#[tarpc::service]
pub trait Coordinator {
    /// Request a unit of work. Replies `Unavailable` when the current phase
    /// has no idle task left.
    async fn assign(worker_id: String) -> Result<TaskAssignment, Status>;
    /// Report an assigned task as done. Idempotent for the task's assignee;
    /// stale reports from other workers reply `NotFound`.
    async fn complete(
        worker_id: String,
        taskname: String,
        output_filename: String,
    ) -> Result<(), Status>;
}
