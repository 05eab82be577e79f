//! Span timing for reasoning jobs.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::core::JobStatus;
use crate::queue::ReasoningJob;

/// Log attributes for one reasoning job attempt.
#[derive(Debug, Clone, Serialize)]
pub struct JobSpanAttributes {
    pub job_id: String,
    pub execution_id: String,
    pub step_name: String,
    pub attempt: u32,
    /// Status the attempt left the job in.
    pub status: Option<JobStatus>,
    pub duration_ms: Option<f64>,
    pub error: Option<String>,
}

impl JobSpanAttributes {
    /// Snapshots the identity and current attempt of `job`.
    #[must_use]
    pub fn for_job(job: &ReasoningJob) -> Self {
        Self {
            job_id: job.id.clone(),
            execution_id: job.execution_id.clone(),
            step_name: job.step_name.clone(),
            attempt: job.attempt,
            status: None,
            duration_ms: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Rounded to microsecond precision.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some((duration_ms * 1000.0).round() / 1000.0);
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Flattens into `job.*` keys, sorted for stable log output.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<&'static str, String> {
        let mut attrs = BTreeMap::from([
            ("job.id", self.job_id.clone()),
            ("job.execution_id", self.execution_id.clone()),
            ("job.step_name", self.step_name.clone()),
            ("job.attempt", self.attempt.to_string()),
        ]);

        if let Some(status) = self.status {
            attrs.insert("job.status", status.to_string());
        }
        if let Some(ms) = self.duration_ms {
            attrs.insert("job.duration_ms", ms.to_string());
        }
        if let Some(error) = &self.error {
            attrs.insert("job.error", error.clone());
        }
        attrs
    }
}

/// Measures one named span and traces its duration when finished.
#[derive(Debug)]
pub struct SpanTimer {
    name: &'static str,
    started: Instant,
}

impl SpanTimer {
    #[must_use]
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stops the timer and returns the elapsed milliseconds.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::trace!(span = self.name, duration_ms, "span finished");
        duration_ms
    }
}
