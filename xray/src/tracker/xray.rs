//! The execution tracker.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::{Execution, Metadata, Step};
use crate::errors::{Result, XRayError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::queue::ReasoningQueue;
use crate::storage::StorageProvider;

/// Records step boundaries of one execution.
///
/// Steps are appended to the execution in completion order. Persisting the
/// execution and enqueueing reasoning are separate explicit calls, so a
/// caller can save a run and return before any reasoning cost is incurred:
///
/// ```no_run
/// # async fn run(storage: std::sync::Arc<xray::storage::InMemoryStorage>, queue: xray::queue::ReasoningQueue) -> xray::errors::Result<()> {
/// use serde_json::json;
/// use xray::core::Metadata;
/// use xray::tracker::XRay;
///
/// let mut xray = XRay::new("exec-1", Metadata::new()).with_storage(storage);
/// xray.start_step("fetch", json!({"q": "shoes"}))?;
/// xray.end_step("fetch", json!({"count": 3}));
/// xray.end(json!({"status": "ok"}));
/// xray.save().await?;
/// xray.enqueue_reasoning(&queue).await;
/// # Ok(())
/// # }
/// ```
pub struct XRay {
    execution: Execution,
    open_steps: HashMap<String, Step>,
    pending_reasoning: Vec<String>,
    storage: Option<Arc<dyn StorageProvider>>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for XRay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XRay")
            .field("execution_id", &self.execution.execution_id)
            .field("steps", &self.execution.steps.len())
            .field("open_steps", &self.open_steps.len())
            .field("has_storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

impl XRay {
    /// Starts tracking an execution.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            execution: Execution::new(execution_id, metadata),
            open_steps: HashMap::new(),
            pending_reasoning: Vec::new(),
            storage: None,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the storage used by [`save`](Self::save).
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the sink receiving step events.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the execution id.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution.execution_id
    }

    /// Returns the execution recorded so far.
    #[must_use]
    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Names of steps started but not yet ended, in no particular order.
    pub fn open_steps(&self) -> impl Iterator<Item = &str> {
        self.open_steps.keys().map(String::as_str)
    }

    /// Names of finalized steps awaiting reasoning, in completion order.
    #[must_use]
    pub fn pending_reasoning(&self) -> &[String] {
        &self.pending_reasoning
    }

    /// Sets one execution metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.execution.metadata.insert(key.into(), value);
    }

    /// Opens a step.
    ///
    /// # Errors
    ///
    /// Returns [`XRayError::DuplicateStep`] if a step with that name is
    /// already open. The open step is left untouched.
    pub fn start_step(&mut self, name: impl Into<String>, input: Value) -> Result<()> {
        self.start_step_with_metadata(name, input, Metadata::new())
    }

    /// Opens a step with metadata.
    ///
    /// # Errors
    ///
    /// Same as [`start_step`](Self::start_step).
    pub fn start_step_with_metadata(
        &mut self,
        name: impl Into<String>,
        input: Value,
        metadata: Metadata,
    ) -> Result<()> {
        let name = name.into();
        if self.open_steps.contains_key(&name) {
            return Err(XRayError::DuplicateStep {
                execution_id: self.execution.execution_id.clone(),
                step_name: name,
            });
        }

        debug!(execution_id = %self.execution.execution_id, step_name = %name, "Step started");
        self.events.try_emit(
            event_types::STEP_STARTED,
            Some(serde_json::json!({
                "execution_id": self.execution.execution_id,
                "step_name": name,
            })),
        );
        let step = Step::new(name.clone(), input).with_metadata(metadata);
        self.open_steps.insert(name, step);
        Ok(())
    }

    /// Ends an open step with its output. Unknown names are ignored.
    pub fn end_step(&mut self, name: &str, output: Value) -> Option<&Step> {
        let mut step = self.open_steps.remove(name)?;
        step.complete(output);
        Some(self.finalize(step, event_types::STEP_COMPLETED))
    }

    /// Ends an open step with an error message. Unknown names are ignored.
    pub fn error_step(&mut self, name: &str, error: impl Into<String>) -> Option<&Step> {
        let mut step = self.open_steps.remove(name)?;
        step.fail(error);
        Some(self.finalize(step, event_types::STEP_FAILED))
    }

    fn finalize(&mut self, step: Step, event_type: &str) -> &Step {
        debug!(
            execution_id = %self.execution.execution_id,
            step_name = %step.name,
            duration_ms = step.duration_ms,
            failed = step.is_error(),
            "Step finished"
        );
        self.events.try_emit(
            event_type,
            Some(serde_json::json!({
                "execution_id": self.execution.execution_id,
                "step_name": step.name,
                "duration_ms": step.duration_ms,
                "error": step.error,
            })),
        );
        self.pending_reasoning.push(step.name.clone());
        self.execution.steps.push(step);
        &self.execution.steps[self.execution.steps.len() - 1]
    }

    /// Closes the execution and returns a snapshot of it.
    ///
    /// Neither persists nor enqueues reasoning.
    pub fn end(&mut self, final_outcome: Value) -> Execution {
        self.execution.close(final_outcome);
        self.events.try_emit(
            event_types::EXECUTION_ENDED,
            Some(serde_json::json!({
                "execution_id": self.execution.execution_id,
                "steps": self.execution.steps.len(),
                "open_steps": self.open_steps.len(),
            })),
        );
        self.execution.clone()
    }

    /// Upserts the execution into the configured storage. No-op without storage.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the write is rejected or fails.
    pub async fn save(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            debug!(execution_id = %self.execution.execution_id, "No storage configured, skipping save");
            return Ok(());
        };
        storage.save_execution(&self.execution).await?;
        Ok(())
    }

    /// Enqueues reasoning for every finalized step, one after another.
    ///
    /// Call after [`save`](Self::save): the queue reads steps back from storage.
    pub async fn enqueue_reasoning(&self, queue: &ReasoningQueue) -> Vec<String> {
        let mut job_ids = Vec::with_capacity(self.pending_reasoning.len());
        for step_name in &self.pending_reasoning {
            job_ids.push(
                queue
                    .enqueue(self.execution.execution_id.as_str(), step_name.as_str())
                    .await,
            );
        }
        job_ids
    }
}
