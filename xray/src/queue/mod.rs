//! Reasoning job queue.
//!
//! The queue turns "explain this step" requests into [`ReasoningJob`]s, runs
//! them under a concurrency bound, retries transient generator failures with
//! a table-driven backoff, and mirrors every transition to an optional
//! [`JobStore`](crate::storage::JobStore) so a restarted process can resume.

mod backoff;
mod classify;
mod config;
mod dispatcher;
mod job;
mod reasoning_queue;

#[cfg(test)]
mod integration_tests;

pub use backoff::{table_delay, JitterStrategy};
pub use classify::{classify_error, classify_generation_error, classify_message, FailureClass};
pub use config::QueueConfig;
pub use dispatcher::Dispatcher;
pub use job::{QueueStats, ReasoningJob};
pub use reasoning_queue::{ReasoningQueue, ReasoningQueueBuilder};
