//! Assignment/completion state machine driving the two-phase pipeline.
//!
//! One `Scheduler` per job, owned behind a single mutex; no operation here
//! performs blocking I/O. Counters are maintained eagerly alongside the task
//! states, and `finished` is sticky once set.

use tracing::{debug, info};

use crate::mr::registry::{TaskRegistry, TaskState};
use crate::mr::rpc::{Status, TaskAssignment, TaskKind};

/// Aggregate task counts for one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounters {
    pub idle: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl PhaseCounters {
    pub fn total(&self) -> usize {
        self.idle + self.in_progress + self.completed
    }
}

#[derive(Debug)]
pub struct Scheduler {
    registry: TaskRegistry,
    map: PhaseCounters,
    reduce: PhaseCounters,
    finished: bool,
}

impl Scheduler {
    pub fn new(registry: TaskRegistry) -> Self {
        let map = PhaseCounters {
            idle: registry.map_tasks().len(),
            ..PhaseCounters::default()
        };
        let reduce = PhaseCounters {
            idle: registry.reduce_tasks().len(),
            ..PhaseCounters::default()
        };
        // A job with nothing to schedule is already done.
        let finished = map.total() == 0 && reduce.total() == 0;
        Self {
            registry,
            map,
            reduce,
            finished,
        }
    }

    /// Whether every reduce task has completed.
    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn map_counters(&self) -> PhaseCounters {
        self.map
    }

    pub fn reduce_counters(&self) -> PhaseCounters {
        self.reduce
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// The job stays in the map phase until every map task has completed.
    fn phase(&self) -> TaskKind {
        if self.map.completed < self.map.total() {
            TaskKind::Map
        } else {
            TaskKind::Reduce
        }
    }

    /// Hand the lowest-id idle task of the current phase to `worker_id`.
    pub fn assign(&mut self, worker_id: &str) -> Result<TaskAssignment, Status> {
        if worker_id.is_empty() {
            return Err(Status::InvalidArgument("empty worker id".into()));
        }
        match self.phase() {
            TaskKind::Map => {
                let Some(task) = self.registry.find_idle_map() else {
                    return Err(Status::Unavailable);
                };
                task.state = TaskState::InProgress;
                task.assigned_worker = Some(worker_id.to_string());
                self.map.idle -= 1;
                self.map.in_progress += 1;
                info!(task = task.id, worker = worker_id, "assigned map task");
                Ok(TaskAssignment {
                    taskname: TaskKind::Map,
                    input_filenames: vec![task.input_segment.clone()],
                    output_filename: task.intermediate.clone(),
                })
            }
            TaskKind::Reduce => {
                let Some(task) = self.registry.find_idle_reduce() else {
                    return Err(Status::Unavailable);
                };
                task.state = TaskState::InProgress;
                task.assigned_worker = Some(worker_id.to_string());
                self.reduce.idle -= 1;
                self.reduce.in_progress += 1;
                info!(task = task.id, worker = worker_id, "assigned reduce task");
                Ok(TaskAssignment {
                    taskname: TaskKind::Reduce,
                    input_filenames: task.inputs.clone(),
                    output_filename: task.output.clone(),
                })
            }
        }
    }

    /// Retire the task `worker_id` holds in the named phase.
    ///
    /// A duplicate report for an already-completed task is a no-op `Ok`; a
    /// report from a worker that owns nothing in the phase never retires a
    /// task and replies `NotFound`.
    pub fn complete(
        &mut self,
        worker_id: &str,
        taskname: &str,
        output_filename: &str,
    ) -> Result<(), Status> {
        if worker_id.is_empty() {
            return Err(Status::InvalidArgument("empty worker id".into()));
        }
        match taskname.parse()? {
            TaskKind::Map => {
                if let Some(task) = self.registry.find_worker_map(worker_id, TaskState::InProgress)
                {
                    task.state = TaskState::Complete;
                    self.map.in_progress -= 1;
                    self.map.completed += 1;
                    info!(
                        task = task.id,
                        worker = worker_id,
                        output = output_filename,
                        "map task complete"
                    );
                    if self.map.completed == self.map.total() {
                        info!("all map tasks complete; reduce phase open");
                    }
                } else if self
                    .registry
                    .find_worker_map(worker_id, TaskState::Complete)
                    .is_some()
                {
                    debug!(worker = worker_id, "duplicate map completion ignored");
                } else {
                    return Err(Status::NotFound(format!(
                        "no map task assigned to worker {worker_id:?}"
                    )));
                }
            }
            TaskKind::Reduce => {
                if let Some(task) = self
                    .registry
                    .find_worker_reduce(worker_id, TaskState::InProgress)
                {
                    task.state = TaskState::Complete;
                    self.reduce.in_progress -= 1;
                    self.reduce.completed += 1;
                    info!(
                        task = task.id,
                        worker = worker_id,
                        output = output_filename,
                        "reduce task complete"
                    );
                    if self.reduce.completed == self.reduce.total() {
                        self.finished = true;
                        info!("all reduce tasks complete; job finished");
                    }
                } else if self
                    .registry
                    .find_worker_reduce(worker_id, TaskState::Complete)
                    .is_some()
                {
                    debug!(worker = worker_id, "duplicate reduce completion ignored");
                } else {
                    return Err(Status::NotFound(format!(
                        "no reduce task assigned to worker {worker_id:?}"
                    )));
                }
            }
        }
        Ok(())
    }
}
