//! A MapReduce runtime: a coordinator that segments a directory of text
//! inputs and schedules two-phase map/reduce tasks, and stateless workers
//! that execute user map/reduce functions against a shared filesystem.

pub mod mr;
