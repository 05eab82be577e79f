//! Core data model: executions, steps, and job status.

mod execution;
mod status;
mod step;

pub use execution::Execution;
pub use status::JobStatus;
pub use step::{Metadata, Step};
