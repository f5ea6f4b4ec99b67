// Aggregation pipeline: normalize -> resolve identity -> merge -> filter

pub mod completeness;
pub mod identity;
pub mod merge;
pub mod normalize;
pub mod orchestrator;

pub use orchestrator::{Orchestrator, RunResult};
