//! RPC server mediating all external access to the scheduler.

use std::sync::{Arc, Mutex};

use futures::future::{ready, Ready};
use tarpc::context;

use crate::mr::rpc::{Coordinator, Status, TaskAssignment};
use crate::mr::scheduler::Scheduler;

/// Serving handle cloned once per connection; every request takes the one
/// scheduler mutex for the duration of its logical step.
#[derive(Clone)]
pub struct CoordinatorServer {
    scheduler: Arc<Mutex<Scheduler>>,
}

impl CoordinatorServer {
    pub fn new(scheduler: Arc<Mutex<Scheduler>>) -> Self {
        Self { scheduler }
    }
}

#[tarpc::server]
impl Coordinator for CoordinatorServer {
    type AssignFut = Ready<Result<TaskAssignment, Status>>;
    type CompleteFut = Ready<Result<(), Status>>;

    fn assign(self, _: context::Context, worker_id: String) -> Self::AssignFut {
        ready(self.scheduler.lock().unwrap().assign(&worker_id))
    }

    fn complete(
        self,
        _: context::Context,
        worker_id: String,
        taskname: String,
        output_filename: String,
    ) -> Self::CompleteFut {
        ready(
            self.scheduler
                .lock()
                .unwrap()
                .complete(&worker_id, &taskname, &output_filename),
        )
    }
}
