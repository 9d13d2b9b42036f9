//! Scheduler protocol: phase barrier, counters, stale and duplicate
//! completions.

use mapred_rs::mr::registry::{TaskRegistry, TaskState};
use mapred_rs::mr::rpc::{Status, TaskKind};
use mapred_rs::mr::scheduler::Scheduler;

fn job(num_segments: usize, num_reducers: usize) -> Scheduler {
    let segments = (0..num_segments)
        .map(|i| format!("segments/segment_{i}"))
        .collect();
    let intermediates = (0..num_segments).map(|i| format!("mr-int-{i}")).collect();
    let outputs = (0..num_reducers).map(|i| format!("mr-out-{i}")).collect();
    Scheduler::new(TaskRegistry::new(segments, intermediates, outputs))
}

/// idle + in_progress + completed stays equal to the task totals, and
/// assigned workers are present exactly on non-idle tasks.
fn assert_invariants(scheduler: &Scheduler) {
    let map = scheduler.map_counters();
    let reduce = scheduler.reduce_counters();
    assert_eq!(map.total(), scheduler.registry().map_tasks().len());
    assert_eq!(reduce.total(), scheduler.registry().reduce_tasks().len());
    assert_eq!(
        map.idle,
        scheduler
            .registry()
            .map_tasks()
            .iter()
            .filter(|t| t.state == TaskState::Idle)
            .count()
    );
    assert_eq!(
        reduce.completed,
        scheduler
            .registry()
            .reduce_tasks()
            .iter()
            .filter(|t| t.state == TaskState::Complete)
            .count()
    );
    for task in scheduler.registry().map_tasks() {
        assert_eq!(task.assigned_worker.is_some(), task.state != TaskState::Idle);
    }
    for task in scheduler.registry().reduce_tasks() {
        assert_eq!(task.assigned_worker.is_some(), task.state != TaskState::Idle);
    }
}

#[test]
fn empty_worker_id_is_rejected() {
    let mut scheduler = job(1, 1);
    assert!(matches!(
        scheduler.assign(""),
        Err(Status::InvalidArgument(_))
    ));
    assert!(matches!(
        scheduler.complete("", "map", "mr-int-0"),
        Err(Status::InvalidArgument(_))
    ));
}

#[test]
fn bad_taskname_is_rejected() {
    let mut scheduler = job(1, 1);
    scheduler.assign("w1").unwrap();
    assert!(matches!(
        scheduler.complete("w1", "shuffle", "mr-int-0"),
        Err(Status::InvalidArgument(_))
    ));
}

#[test]
fn assigns_lowest_idle_map_first() {
    let mut scheduler = job(3, 1);
    let first = scheduler.assign("w1").unwrap();
    assert_eq!(first.taskname, TaskKind::Map);
    assert_eq!(first.input_filenames, vec!["segments/segment_0"]);
    assert_eq!(first.output_filename, "mr-int-0");
    let second = scheduler.assign("w2").unwrap();
    assert_eq!(second.output_filename, "mr-int-1");
    assert_invariants(&scheduler);
}

#[test]
fn in_progress_tasks_are_never_reassigned() {
    let mut scheduler = job(1, 1);
    scheduler.assign("w1").unwrap();
    assert_eq!(scheduler.assign("w2"), Err(Status::Unavailable));
}

#[test]
fn no_reduce_task_before_all_maps_complete() {
    // Two maps out, none complete: a third worker polls and must get
    // nothing rather than a reduce task.
    let mut scheduler = job(2, 1);
    scheduler.assign("workerA").unwrap();
    scheduler.assign("workerB").unwrap();
    assert_eq!(scheduler.assign("workerC"), Err(Status::Unavailable));

    scheduler.complete("workerA", "map", "mr-int-0").unwrap();
    assert_eq!(scheduler.assign("workerC"), Err(Status::Unavailable));

    scheduler.complete("workerB", "map", "mr-int-1").unwrap();
    let task = scheduler.assign("workerC").unwrap();
    assert_eq!(task.taskname, TaskKind::Reduce);
    assert_invariants(&scheduler);
}

#[test]
fn reduce_inputs_are_partitioned_contiguously() {
    // Three segments over two reducers: group size ceil(3/2) = 2.
    let mut scheduler = job(3, 2);
    for worker in ["w1", "w2", "w3"] {
        scheduler.assign(worker).unwrap();
        scheduler.complete(worker, "map", "ignored").unwrap();
    }
    let first = scheduler.assign("w1").unwrap();
    assert_eq!(first.input_filenames, vec!["mr-int-0", "mr-int-1"]);
    assert_eq!(first.output_filename, "mr-out-0");
    let second = scheduler.assign("w2").unwrap();
    assert_eq!(second.input_filenames, vec!["mr-int-2"]);
    assert_eq!(second.output_filename, "mr-out-1");
}

#[test]
fn stale_completion_never_retires_a_task() {
    // workerA holds map 0 and vanishes; workerB's bogus completion must not
    // touch it.
    let mut scheduler = job(1, 1);
    scheduler.assign("workerA").unwrap();
    let before = scheduler.map_counters();
    assert!(matches!(
        scheduler.complete("workerB", "map", "mr-int-0"),
        Err(Status::NotFound(_))
    ));
    assert_eq!(scheduler.map_counters(), before);
    assert_eq!(
        scheduler.registry().map_tasks()[0].state,
        TaskState::InProgress
    );
    assert_invariants(&scheduler);
}

#[test]
fn duplicate_completion_is_an_idempotent_ok() {
    let mut scheduler = job(1, 1);
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();
    assert_eq!(scheduler.map_counters().completed, 1);
    assert_invariants(&scheduler);
}

#[test]
fn completion_prefers_the_workers_in_progress_task() {
    // A worker that already completed map 0 and now holds map 1 must retire
    // map 1, not trip the idempotence arm on map 0.
    let mut scheduler = job(2, 1);
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-1").unwrap();
    assert_eq!(scheduler.map_counters().completed, 2);
    assert_invariants(&scheduler);
}

#[test]
fn finished_exactly_when_every_reduce_completes() {
    let mut scheduler = job(1, 2);
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();
    assert!(!scheduler.finished());

    scheduler.assign("w1").unwrap();
    scheduler.assign("w2").unwrap();
    scheduler.complete("w1", "reduce", "mr-out-0").unwrap();
    assert!(!scheduler.finished());
    scheduler.complete("w2", "reduce", "mr-out-1").unwrap();
    assert!(scheduler.finished());
    assert_invariants(&scheduler);
}

#[test]
fn empty_reduce_partitions_still_schedule_and_finish() {
    // One segment, three reducers: groups [mr-int-0], [], [].
    let mut scheduler = job(1, 3);
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();

    let mut empty_groups = 0;
    for worker in ["w1", "w2", "w3"] {
        let task = scheduler.assign(worker).unwrap();
        assert_eq!(task.taskname, TaskKind::Reduce);
        if task.input_filenames.is_empty() {
            empty_groups += 1;
        }
        scheduler
            .complete(worker, "reduce", &task.output_filename)
            .unwrap();
    }
    assert_eq!(empty_groups, 2);
    assert!(scheduler.finished());
}

#[test]
fn degenerate_job_is_finished_at_construction() {
    let mut scheduler = job(0, 0);
    assert!(scheduler.finished());
    assert_eq!(scheduler.assign("w1"), Err(Status::Unavailable));
    // Sticky: nothing can unfinish the job.
    assert!(scheduler.finished());
}

#[test]
fn zero_reducers_with_maps_never_finishes() {
    let mut scheduler = job(1, 0);
    assert!(!scheduler.finished());
    scheduler.assign("w1").unwrap();
    scheduler.complete("w1", "map", "mr-int-0").unwrap();
    assert!(!scheduler.finished());
    assert_eq!(scheduler.assign("w1"), Err(Status::Unavailable));
}

#[test]
fn zero_segments_with_reducers_goes_straight_to_reduce() {
    let mut scheduler = job(0, 2);
    let task = scheduler.assign("w1").unwrap();
    assert_eq!(task.taskname, TaskKind::Reduce);
    assert!(task.input_filenames.is_empty());
}

#[test]
fn counters_hold_through_a_full_job() {
    let mut scheduler = job(4, 3);
    assert_invariants(&scheduler);
    for worker in ["w1", "w2"] {
        loop {
            match scheduler.assign(worker) {
                Ok(task) => {
                    assert_invariants(&scheduler);
                    scheduler
                        .complete(worker, &task.taskname.to_string(), &task.output_filename)
                        .unwrap();
                    assert_invariants(&scheduler);
                }
                Err(Status::Unavailable) => break,
                Err(other) => panic!("unexpected status: {other}"),
            }
        }
    }
    assert!(scheduler.finished());
    assert_eq!(scheduler.map_counters().completed, 4);
    assert_eq!(scheduler.reduce_counters().completed, 3);
}
