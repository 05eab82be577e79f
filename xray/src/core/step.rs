//! A single tracked unit of work.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::{now_utc, Timestamp};

/// Opaque key-value metadata attached to executions and steps.
pub type Metadata = HashMap<String, serde_json::Value>;

/// One tracked step of an execution.
///
/// A step is created open by the tracker, finalized exactly once with either
/// an output or an error, and afterwards only its `reasoning` changes, written
/// out-of-band by the reasoning queue through the storage provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Step name. Unique among open steps, may repeat across re-runs.
    pub name: String,
    /// Input recorded at start.
    pub input: serde_json::Value,
    /// Output recorded at end. Absent on the error path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Failure message. Absent on the success path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the step was started.
    pub started_at: Timestamp,
    /// When the step was finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<Timestamp>,
    /// `ended_at - started_at` in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Generated explanation of the step's outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Caller metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Step {
    /// Opens a new step started now.
    #[must_use]
    pub fn new(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            input,
            output: None,
            error: None,
            started_at: now_utc(),
            ended_at: None,
            duration_ms: None,
            reasoning: None,
            metadata: Metadata::new(),
        }
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Finalizes the step with an output.
    pub fn complete(&mut self, output: serde_json::Value) {
        self.output = Some(output);
        self.error = None;
        self.finish();
    }

    /// Finalizes the step with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.output = None;
        self.finish();
    }

    fn finish(&mut self) {
        let ended_at = now_utc();
        self.duration_ms = Some((ended_at - self.started_at).num_milliseconds());
        self.ended_at = Some(ended_at);
    }

    /// Returns true once the step has been finalized.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Returns true if the step ended on the error path.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if non-empty reasoning is present.
    #[must_use]
    pub fn has_reasoning(&self) -> bool {
        self.reasoning.as_deref().is_some_and(|r| !r.trim().is_empty())
    }
}
