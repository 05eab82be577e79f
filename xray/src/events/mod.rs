//! Event sink system for observability.
//!
//! The reasoning queue and the tracker report lifecycle transitions to an
//! [`EventSink`]. Sinks never fail the caller: emission errors are logged and
//! suppressed.

mod sink;

pub use sink::{
    CollectingEventSink, EventSink, FanoutEventSink, LoggingEventSink, NoOpEventSink, RecordedEvent,
};

/// Event type names emitted by the queue and tracker.
pub mod event_types {
    /// A reasoning job was created.
    pub const JOB_ENQUEUED: &str = "reasoning.job.enqueued";
    /// A reasoning job was dispatched to the generator.
    pub const JOB_STARTED: &str = "reasoning.job.started";
    /// A reasoning job reached `completed`.
    pub const JOB_COMPLETED: &str = "reasoning.job.completed";
    /// A reasoning job failed and was scheduled for another attempt.
    pub const JOB_RETRY_SCHEDULED: &str = "reasoning.job.retry_scheduled";
    /// A reasoning job reached `failed`.
    pub const JOB_FAILED: &str = "reasoning.job.failed";
    /// A persisted job was reloaded after a restart.
    pub const JOB_RECOVERED: &str = "reasoning.job.recovered";
    /// A tracked step was opened.
    pub const STEP_STARTED: &str = "xray.step.started";
    /// A tracked step ended with an output.
    pub const STEP_COMPLETED: &str = "xray.step.completed";
    /// A tracked step ended with an error.
    pub const STEP_FAILED: &str = "xray.step.failed";
    /// An execution was closed.
    pub const EXECUTION_ENDED: &str = "xray.execution.ended";
}
