//! # XRay
//!
//! Execution tracing with asynchronous reasoning generation.
//!
//! XRay records the steps of a multi-stage pipeline run and explains them
//! after the fact:
//!
//! - **Step tracking**: mark step boundaries, capture inputs, outputs, errors and timing
//! - **Pluggable storage**: any backend implementing [`storage::StorageProvider`]
//! - **Reasoning queue**: bounded-concurrency generation with table-driven retries,
//!   failure classification, idempotent re-enqueue and crash recovery
//! - **Event-driven observability**: job and step lifecycle events through [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use xray::prelude::*;
//!
//! # async fn run() -> xray::errors::Result<()> {
//! let storage = Arc::new(InMemoryStorage::new());
//! let queue = ReasoningQueue::builder(storage.clone(), Arc::new(HeuristicGenerator::new()))
//!     .config(QueueConfig::default())
//!     .build()?;
//!
//! // Track a run
//! let mut xray = XRay::new("exec-1", Metadata::new()).with_storage(storage.clone());
//! xray.start_step("fetch", json!({"q": "shoes"}))?;
//! xray.end_step("fetch", json!({"count": 3}));
//! xray.end(json!({"status": "ok"}));
//! xray.save().await?;
//!
//! // Explain it in the background
//! xray.enqueue_reasoning(&queue).await;
//! queue.wait_for_idle().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod queue;
pub mod reasoning;
pub mod storage;
pub mod testing;
pub mod tracker;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{Execution, JobStatus, Metadata, Step};
    pub use crate::errors::{GenerationError, NotFoundError, StorageError, XRayError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::queue::{
        JitterStrategy, QueueConfig, QueueStats, ReasoningJob, ReasoningQueue,
    };
    pub use crate::reasoning::{
        FallbackGenerator, FnGenerator, HeuristicGenerator, PromptGenerator, ReasoningGenerator,
        TextGenerator,
    };
    pub use crate::storage::{InMemoryStorage, JobStore, StorageProvider};
    pub use crate::tracker::XRay;
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
