//! Storage contracts consumed by the tracker and the reasoning queue.
//!
//! Any backend (in-memory, relational, object storage) can back an
//! execution record store as long as it satisfies [`StorageProvider`].
//! Persisting reasoning jobs is a separate, optional capability
//! ([`JobStore`]) used only to resume work after a restart.

mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;

use crate::core::{Execution, JobStatus};
use crate::errors::StorageError;
use crate::queue::ReasoningJob;

/// Persists and retrieves execution records.
///
/// Implementations are shared across concurrent queue workers and must be
/// safe for concurrent use.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Upserts an execution by id.
    ///
    /// Creates the record if absent; otherwise replaces all steps and updates
    /// metadata, final outcome and completion timestamp. A rejected execution
    /// must leave prior state untouched.
    async fn save_execution(&self, execution: &Execution) -> Result<(), StorageError>;

    /// Loads an execution by id.
    async fn get_execution_by_id(&self, execution_id: &str)
        -> Result<Option<Execution>, StorageError>;

    /// Returns at most `limit` executions, most recently started first.
    async fn get_all_executions(&self, limit: usize) -> Result<Vec<Execution>, StorageError>;

    /// Sets the reasoning of one step.
    ///
    /// Fails with [`StorageError::NotFound`] if the execution or the step is missing.
    async fn update_step_reasoning(
        &self,
        execution_id: &str,
        step_name: &str,
        reasoning: &str,
    ) -> Result<(), StorageError>;
}

/// Mirrors reasoning job state for crash recovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a newly enqueued job.
    async fn save_job(&self, job: &ReasoningJob) -> Result<(), StorageError>;

    /// Records a job state transition.
    async fn update_job(&self, job: &ReasoningJob) -> Result<(), StorageError>;

    /// Returns every persisted job whose status is in `statuses`.
    async fn get_jobs_by_status(
        &self,
        statuses: &[JobStatus],
    ) -> Result<Vec<ReasoningJob>, StorageError>;
}
