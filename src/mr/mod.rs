pub mod coordinator;
pub mod driver;
pub mod plugin;
pub mod registry;
pub mod rpc;
pub mod scheduler;
pub mod segmenter;
pub mod worker;
