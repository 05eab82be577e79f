//! Test fixtures for executions and storage.

use serde_json::Value;
use std::sync::Arc;

use crate::core::{Execution, Metadata, Step};
use crate::errors::StorageError;
use crate::storage::{InMemoryStorage, StorageProvider};
use crate::utils::generate_uuid;

/// Creates a finished step with `output`.
#[must_use]
pub fn sample_step(name: impl Into<String>, input: Value, output: Value) -> Step {
    let mut step = Step::new(name, input);
    step.complete(output);
    step
}

/// Creates a closed execution with a single `fetch` step that found 3 results.
#[must_use]
pub fn sample_execution(execution_id: impl Into<String>) -> Execution {
    let mut execution = Execution::new(execution_id, Metadata::new());
    execution.steps.push(sample_step(
        "fetch",
        serde_json::json!({"q": "shoes"}),
        serde_json::json!({"count": 3}),
    ));
    execution.close(serde_json::json!({"status": "ok"}));
    execution
}

/// Returns an execution id unlikely to collide across tests.
#[must_use]
pub fn unique_execution_id(prefix: &str) -> String {
    format!("{prefix}-{}", generate_uuid())
}

/// Creates in-memory storage holding `executions`.
///
/// # Errors
///
/// Fails if any execution is rejected by the storage.
pub async fn seeded_storage(
    executions: impl IntoIterator<Item = Execution>,
) -> Result<Arc<InMemoryStorage>, StorageError> {
    let storage = Arc::new(InMemoryStorage::new());
    for execution in executions {
        storage.save_execution(&execution).await?;
    }
    Ok(storage)
}
