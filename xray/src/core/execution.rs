//! One end-to-end run of a tracked pipeline.

use serde::{Deserialize, Serialize};

use super::step::{Metadata, Step};
use crate::utils::{now_utc, Timestamp};

/// A pipeline run and its finalized steps in completion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Caller-supplied unique id.
    pub execution_id: String,
    /// When tracking started.
    pub started_at: Timestamp,
    /// When the execution was closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// Caller metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Outcome recorded when the execution is closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_outcome: Option<serde_json::Value>,
    /// Finalized steps, appended as they complete.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Execution {
    /// Creates an open execution started now.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            execution_id: execution_id.into(),
            started_at: now_utc(),
            ended_at: None,
            metadata,
            final_outcome: None,
            steps: Vec::new(),
        }
    }

    /// Returns true until the execution is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes the execution.
    pub fn close(&mut self, final_outcome: serde_json::Value) {
        self.ended_at = Some(now_utc());
        self.final_outcome = Some(final_outcome);
    }

    /// Finds the step a reasoning job for `name` should target.
    ///
    /// Names may repeat when a step is re-run, so the first same-named step
    /// still lacking reasoning wins; otherwise the first step with that name.
    /// A lookup followed by a write is only stable while no other writer for
    /// the same name runs in between.
    #[must_use]
    pub fn find_step(&self, name: &str) -> Option<&Step> {
        self.target_index(name).map(|idx| &self.steps[idx])
    }

    /// Mutable counterpart of [`Execution::find_step`].
    pub fn find_step_mut(&mut self, name: &str) -> Option<&mut Step> {
        self.target_index(name).map(move |idx| &mut self.steps[idx])
    }

    fn target_index(&self, name: &str) -> Option<usize> {
        let mut first = None;
        for (idx, step) in self.steps.iter().enumerate() {
            if step.name != name {
                continue;
            }
            if !step.has_reasoning() {
                return Some(idx);
            }
            first.get_or_insert(idx);
        }
        first
    }

    /// Steps that do not have reasoning yet.
    pub fn steps_without_reasoning(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|step| !step.has_reasoning())
    }
}
