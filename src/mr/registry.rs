//! In-memory catalog of map and reduce tasks.
//!
//! The registry is plain data; every access is serialized by the scheduler
//! lock one level up.

/// Per-task lifecycle. The only transition out of `InProgress` is a
/// `complete` from the assigned worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InProgress,
    Complete,
}

#[derive(Debug, Clone)]
pub struct MapTask {
    pub id: usize,
    pub state: TaskState,
    pub assigned_worker: Option<String>,
    /// The segment file this task reads.
    pub input_segment: String,
    /// The intermediate file this task writes.
    pub intermediate: String,
}

#[derive(Debug, Clone)]
pub struct ReduceTask {
    pub id: usize,
    pub state: TaskState,
    pub assigned_worker: Option<String>,
    /// Intermediate files this task reads; may be empty for a trailing
    /// partition with no segments.
    pub inputs: Vec<String>,
    /// The output file this task writes.
    pub output: String,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    map_tasks: Vec<MapTask>,
    reduce_tasks: Vec<ReduceTask>,
}

impl TaskRegistry {
    /// Build the catalog for one job. `segments[i]` and `intermediates[i]`
    /// pair up into map task `i`; the intermediates are divided into
    /// `outputs.len()` contiguous reducer input groups.
    pub fn new(segments: Vec<String>, intermediates: Vec<String>, outputs: Vec<String>) -> Self {
        assert_eq!(segments.len(), intermediates.len());
        let groups = partition_inputs(&intermediates, outputs.len());
        let map_tasks = segments
            .into_iter()
            .zip(intermediates)
            .enumerate()
            .map(|(id, (input_segment, intermediate))| MapTask {
                id,
                state: TaskState::Idle,
                assigned_worker: None,
                input_segment,
                intermediate,
            })
            .collect();
        let reduce_tasks = outputs
            .into_iter()
            .zip(groups)
            .enumerate()
            .map(|(id, (output, inputs))| ReduceTask {
                id,
                state: TaskState::Idle,
                assigned_worker: None,
                inputs,
                output,
            })
            .collect();
        Self {
            map_tasks,
            reduce_tasks,
        }
    }

    pub fn map_tasks(&self) -> &[MapTask] {
        &self.map_tasks
    }

    pub fn reduce_tasks(&self) -> &[ReduceTask] {
        &self.reduce_tasks
    }

    /// Lowest-id idle map task. Lowest-id keeps scheduling deterministic and
    /// the hot set of segment files small.
    pub fn find_idle_map(&mut self) -> Option<&mut MapTask> {
        self.map_tasks
            .iter_mut()
            .find(|task| task.state == TaskState::Idle)
    }

    /// Lowest-id idle reduce task.
    pub fn find_idle_reduce(&mut self) -> Option<&mut ReduceTask> {
        self.reduce_tasks
            .iter_mut()
            .find(|task| task.state == TaskState::Idle)
    }

    /// Lowest-id map task in `state` assigned to `worker_id`.
    pub fn find_worker_map(&mut self, worker_id: &str, state: TaskState) -> Option<&mut MapTask> {
        self.map_tasks
            .iter_mut()
            .find(|task| task.state == state && task.assigned_worker.as_deref() == Some(worker_id))
    }

    /// Lowest-id reduce task in `state` assigned to `worker_id`.
    pub fn find_worker_reduce(
        &mut self,
        worker_id: &str,
        state: TaskState,
    ) -> Option<&mut ReduceTask> {
        self.reduce_tasks
            .iter_mut()
            .find(|task| task.state == state && task.assigned_worker.as_deref() == Some(worker_id))
    }
}

/// Divide the intermediate file list into `num_reducers` contiguous groups of
/// size `ceil(len / num_reducers)`. Trailing groups may be shorter or empty.
pub fn partition_inputs(intermediates: &[String], num_reducers: usize) -> Vec<Vec<String>> {
    if num_reducers == 0 {
        return Vec::new();
    }
    let group_size = intermediates.len().div_ceil(num_reducers);
    (0..num_reducers)
        .map(|group| {
            let start = (group * group_size).min(intermediates.len());
            let end = ((group + 1) * group_size).min(intermediates.len());
            intermediates[start..end].to_vec()
        })
        .collect()
}
