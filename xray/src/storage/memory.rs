//! In-memory storage for tests, demos and single-process deployments.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{JobStore, StorageProvider};
use crate::core::{Execution, JobStatus};
use crate::errors::{NotFoundError, StorageError};
use crate::queue::ReasoningJob;

/// Map-backed implementation of both [`StorageProvider`] and [`JobStore`].
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    executions: RwLock<HashMap<String, Execution>>,
    jobs: RwLock<HashMap<String, ReasoningJob>>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.read().len()
    }

    /// Returns a persisted job row by id.
    #[must_use]
    pub fn job(&self, job_id: &str) -> Option<ReasoningJob> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Returns the number of persisted job rows.
    #[must_use]
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorage {
    async fn save_execution(&self, execution: &Execution) -> Result<(), StorageError> {
        if execution.steps.is_empty() {
            return Err(StorageError::invalid_execution(
                &execution.execution_id,
                "execution has no steps",
            ));
        }

        let mut executions = self.executions.write();
        match executions.get_mut(&execution.execution_id) {
            Some(existing) => {
                existing.steps.clone_from(&execution.steps);
                existing.metadata.clone_from(&execution.metadata);
                existing.final_outcome.clone_from(&execution.final_outcome);
                existing.ended_at = execution.ended_at;
            }
            None => {
                executions.insert(execution.execution_id.clone(), execution.clone());
            }
        }
        Ok(())
    }

    async fn get_execution_by_id(
        &self,
        execution_id: &str,
    ) -> Result<Option<Execution>, StorageError> {
        Ok(self.executions.read().get(execution_id).cloned())
    }

    async fn get_all_executions(&self, limit: usize) -> Result<Vec<Execution>, StorageError> {
        let mut all: Vec<Execution> = self.executions.read().values().cloned().collect();
        all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn update_step_reasoning(
        &self,
        execution_id: &str,
        step_name: &str,
        reasoning: &str,
    ) -> Result<(), StorageError> {
        let mut executions = self.executions.write();
        let execution = executions
            .get_mut(execution_id)
            .ok_or_else(|| NotFoundError::execution(execution_id))?;
        let step = execution
            .find_step_mut(step_name)
            .ok_or_else(|| NotFoundError::step(execution_id, step_name))?;
        step.reasoning = Some(reasoning.to_string());
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryStorage {
    async fn save_job(&self, job: &ReasoningJob) -> Result<(), StorageError> {
        self.jobs.write().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &ReasoningJob) -> Result<(), StorageError> {
        self.jobs.write().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_jobs_by_status(
        &self,
        statuses: &[JobStatus],
    ) -> Result<Vec<ReasoningJob>, StorageError> {
        let mut jobs: Vec<ReasoningJob> = self
            .jobs
            .read()
            .values()
            .filter(|job| statuses.contains(&job.status))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }
}
