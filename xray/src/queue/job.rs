//! Reasoning jobs and queue statistics.

use serde::{Deserialize, Serialize};

use crate::core::JobStatus;
use crate::utils::{generate_job_id, now_utc, Timestamp};

/// One unit of queued work: "generate reasoning for this step".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningJob {
    /// Unique job id.
    pub id: String,
    /// Execution that owns the step.
    pub execution_id: String,
    /// Step to explain.
    pub step_name: String,
    /// 1-based attempt number, incremented on each retry.
    pub attempt: u32,
    /// Lifecycle state.
    pub status: JobStatus,
    /// When the job was enqueued.
    pub created_at: Timestamp,
    /// When the latest attempt was dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the job reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Last failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the next attempt becomes eligible, while a retry is scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<Timestamp>,
}

impl ReasoningJob {
    /// Creates a pending job on its first attempt.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            id: generate_job_id(),
            execution_id: execution_id.into(),
            step_name: step_name.into(),
            attempt: 1,
            status: JobStatus::Pending,
            created_at: now_utc(),
            started_at: None,
            completed_at: None,
            error: None,
            next_retry_at: None,
        }
    }

    /// Rebuilds an in-memory job from a persisted row after a restart.
    ///
    /// The status is reset to pending and the attempt count is kept.
    #[must_use]
    pub fn recovered(mut self) -> Self {
        self.status = JobStatus::Pending;
        self.attempt = self.attempt.max(1);
        self.started_at = None;
        self.next_retry_at = None;
        self
    }

    pub(crate) fn to_event(&self) -> serde_json::Value {
        serde_json::json!({
            "job_id": self.id,
            "execution_id": self.execution_id,
            "step_name": self.step_name,
            "attempt": self.attempt,
            "status": self.status,
            "error": self.error,
        })
    }
}

/// Snapshot of the in-memory job map grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Jobs waiting for a slot or a retry.
    pub pending: usize,
    /// Jobs currently calling the generator.
    pub processing: usize,
    /// Jobs that finished successfully.
    pub completed: usize,
    /// Jobs that gave up.
    pub failed: usize,
    /// Jobs observed since the queue was created, including cleared ones.
    pub total: usize,
}

impl QueueStats {
    /// Returns true when no job is pending or processing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }

    pub(crate) fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}
