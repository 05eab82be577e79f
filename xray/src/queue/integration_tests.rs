//! End-to-end queue scenarios over in-memory storage.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::core::{Execution, JobStatus, Metadata};
use crate::errors::{GenerationError, StorageError, XRayError};
use crate::events::{event_types, CollectingEventSink};
use crate::reasoning::{FnGenerator, ReasoningGenerator};
use crate::storage::{InMemoryStorage, JobStore, MockJobStore, StorageProvider};
use crate::testing::{
    sample_execution, sample_step, seeded_storage, FailingGenerator, MockGenerator,
    SlowGenerator, StaticGenerator,
};
use crate::tracker::XRay;

fn fast_config() -> QueueConfig {
    QueueConfig::new().with_retry_delays_ms([1, 1, 1, 1])
}

fn queue_over(
    storage: &Arc<InMemoryStorage>,
    generator: Arc<dyn ReasoningGenerator>,
    config: QueueConfig,
) -> ReasoningQueue {
    ReasoningQueue::builder(storage.clone(), generator)
        .config(config)
        .build()
        .unwrap()
}

async fn stored_reasoning(
    storage: &InMemoryStorage,
    execution_id: &str,
    step: usize,
) -> Option<String> {
    storage
        .get_execution_by_id(execution_id)
        .await
        .unwrap()
        .unwrap()
        .steps[step]
        .reasoning
        .clone()
}

fn execution_with_steps(execution_id: &str, count: usize) -> Execution {
    let mut execution = Execution::new(execution_id, Metadata::new());
    for i in 0..count {
        execution
            .steps
            .push(sample_step(format!("step-{i}"), json!(i), json!({"title": i})));
    }
    execution
}

#[tokio::test]
async fn test_tracked_execution_gets_reasoning() {
    let storage = Arc::new(InMemoryStorage::new());
    let generator = Arc::new(StaticGenerator::new("Fetched 3 results"));
    let queue = queue_over(&storage, generator, fast_config());

    let mut xray = XRay::new("exec-1", Metadata::new()).with_storage(storage.clone());
    xray.start_step("fetch", json!({"q": "shoes"})).unwrap();
    xray.end_step("fetch", json!({"count": 3}));
    xray.end(json!({"status": "ok"}));
    xray.save().await.unwrap();

    let job_ids = xray.enqueue_reasoning(&queue).await;
    assert_eq!(job_ids.len(), 1);
    queue.process_execution("exec-1").await.unwrap();

    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("Fetched 3 results")
    );
    let job = queue.get_job(&job_ids[0]).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator =
        Arc::new(MockGenerator::replying("Fetched 3 results").failing_first(3, "ETIMEDOUT"));
    let queue = queue_over(&storage, generator.clone(), fast_config().with_max_retries(4));

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempt, 4);
    assert!(job.error.is_none());
    assert_eq!(generator.call_count(), 4);
    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("Fetched 3 results")
    );
}

#[tokio::test]
async fn test_non_retryable_failure_fails_first_attempt() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(MockGenerator::failing("invalid input format"));
    let queue = queue_over(&storage, generator.clone(), fast_config());

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 1);
    assert_eq!(job.error.as_deref(), Some("invalid input format"));
    assert_eq!(generator.call_count(), 1);
    assert_eq!(stored_reasoning(&storage, "exec-1", 0).await, None);
}

#[tokio::test]
async fn test_retry_exhaustion() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(MockGenerator::failing("read ECONNRESET"));
    let queue = queue_over(&storage, generator.clone(), fast_config().with_max_retries(3));

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 3);
    assert_eq!(generator.call_count(), 3);
    assert_eq!(job.error.as_deref(), Some("read ECONNRESET"));
    assert_eq!(stored_reasoning(&storage, "exec-1", 0).await, None);
}

#[tokio::test]
async fn test_rate_limit_status_is_retried() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(FailingGenerator::new("slow down").with_status(429));
    let queue = queue_over(&storage, generator, fast_config().with_max_retries(2));

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    assert_eq!(queue.get_job(&job_id).unwrap().attempt, 2);
}

#[tokio::test]
async fn test_existing_reasoning_short_circuits() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    storage
        .update_step_reasoning("exec-1", "fetch", "Already explained")
        .await
        .unwrap();
    let generator = Arc::new(MockGenerator::replying("new"));
    let queue = queue_over(&storage, generator.clone(), fast_config());

    let first = queue.enqueue("exec-1", "fetch").await;
    let second = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    assert_eq!(queue.get_job(&first).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.get_job(&second).unwrap().status, JobStatus::Completed);
    assert_eq!(generator.call_count(), 0);
    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("Already explained")
    );
}

#[tokio::test]
async fn test_double_enqueue_race_generates_once() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(MockGenerator::replying("Fetched 3 results"));
    let queue = queue_over(&storage, generator.clone(), fast_config().with_concurrency(1));

    queue.enqueue("exec-1", "fetch").await;
    queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let stats = queue.get_stats();
    assert_eq!(stats.completed, 2);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_enqueue_execution_skips_explained_steps() {
    let mut execution = execution_with_steps("exec-1", 3);
    execution.steps[1].reasoning = Some("done".to_string());
    let storage = seeded_storage([execution]).await.unwrap();
    let generator = Arc::new(MockGenerator::replying("explained"));
    let queue = queue_over(&storage, generator.clone(), fast_config());

    let job_ids = queue.process_execution("exec-1").await.unwrap();

    assert_eq!(job_ids.len(), 2);
    let mut called = generator.called_steps();
    called.sort();
    assert_eq!(called, vec!["step-0", "step-2"]);

    let stats = queue.get_stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.processing, 0);
    assert_eq!(stats.completed, 2);

    let again = queue.enqueue_execution("exec-1").await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_process_execution_waits_for_retries() {
    let storage = seeded_storage([execution_with_steps("exec-1", 4)]).await.unwrap();
    let generator =
        Arc::new(MockGenerator::replying("ok").failing_first(2, "503 Service Unavailable"));
    let queue = queue_over(
        &storage,
        generator,
        fast_config().with_retry_delays_ms([20, 20]),
    );

    queue.process_execution("exec-1").await.unwrap();

    let stats = queue.get_stats();
    assert!(stats.is_idle());
    assert_eq!(stats.completed, 4);
    assert_eq!(queue.jobs_for_execution("exec-1").len(), 4);
}

#[tokio::test]
async fn test_missing_execution() {
    let storage = Arc::new(InMemoryStorage::new());
    let generator = Arc::new(MockGenerator::replying("x"));
    let queue = queue_over(&storage, generator.clone(), fast_config());

    let err = queue.process_execution("nope").await.unwrap_err();
    assert!(err.is_not_found());

    let job_id = queue.enqueue("nope", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 1);
    assert_eq!(job.error.as_deref(), Some("Execution not found: nope"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_missing_step_is_not_retried() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let queue = queue_over(&storage, Arc::new(MockGenerator::replying("x")), fast_config());

    let job_id = queue.enqueue("exec-1", "rank").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 1);
    assert!(job.error.unwrap().contains("'rank' not found"));
}

#[tokio::test]
async fn test_empty_reasoning_fails_job() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let queue = queue_over(&storage, Arc::new(StaticGenerator::new("   ")), fast_config());

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 1);
}

#[tokio::test]
async fn test_generator_timeout_is_retryable() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(SlowGenerator::with_delay_ms(500));
    let config = fast_config()
        .with_max_retries(2)
        .with_generator_timeout(Duration::from_millis(10));
    let queue = queue_over(&storage, generator.clone(), config);

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let job = queue.get_job(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt, 2);
    assert_eq!(generator.call_count(), 2);
    assert!(job.error.unwrap().contains("timed out after 10ms"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bound() {
    let storage = seeded_storage([execution_with_steps("exec-1", 8)]).await.unwrap();
    let generator = Arc::new(SlowGenerator::with_delay_ms(20));
    let queue = queue_over(&storage, generator.clone(), fast_config().with_concurrency(2));

    queue.process_execution("exec-1").await.unwrap();

    assert_eq!(generator.call_count(), 8);
    let max = generator.max_in_flight();
    assert!(max <= 2, "saw {max} concurrent generator calls");
    assert_eq!(queue.get_stats().completed, 8);
}

#[tokio::test]
async fn test_generator_sees_stored_step() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = FnGenerator::new(|step| async move {
        match step.output.as_ref().and_then(|o| o["count"].as_u64()) {
            Some(n) => Ok(format!("Fetched {n} results")),
            None => Err(GenerationError::failed("no count")),
        }
    });
    let queue = queue_over(&storage, Arc::new(generator), fast_config());

    queue.process_execution("exec-1").await.unwrap();

    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("Fetched 3 results")
    );
}

#[tokio::test]
async fn test_jobs_are_mirrored_to_job_store() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let queue = ReasoningQueue::builder(storage.clone(), Arc::new(StaticGenerator::new("ok")))
        .config(fast_config())
        .job_store(storage.clone())
        .build()
        .unwrap();

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    let row = storage.job(&job_id).unwrap();
    assert_eq!(row.status, JobStatus::Completed);
    assert_eq!(row, queue.get_job(&job_id).unwrap());
}

#[tokio::test]
async fn test_recovery_resumes_persisted_jobs() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();

    let mut interrupted = ReasoningJob::new("exec-1", "fetch");
    interrupted.status = JobStatus::Processing;
    interrupted.attempt = 2;
    storage.save_job(&interrupted).await.unwrap();

    let mut finished = ReasoningJob::new("exec-1", "fetch");
    finished.status = JobStatus::Failed;
    storage.save_job(&finished).await.unwrap();

    let generator = Arc::new(MockGenerator::replying("Fetched 3 results"));
    let queue = ReasoningQueue::builder(storage.clone(), generator.clone())
        .config(fast_config())
        .job_store(storage.clone())
        .build()
        .unwrap();

    queue.wait_for_idle().await;

    let job = queue.get_job(&interrupted.id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempt, 2);
    assert!(queue.get_job(&finished.id).is_none());
    assert_eq!(generator.call_count(), 1);
    assert_eq!(storage.job(&interrupted.id).unwrap().status, JobStatus::Completed);
    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("Fetched 3 results")
    );
}

#[tokio::test]
async fn test_load_pending_jobs_explicitly() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    storage
        .save_job(&ReasoningJob::new("exec-1", "fetch"))
        .await
        .unwrap();

    let queue = ReasoningQueue::builder(storage.clone(), Arc::new(StaticGenerator::new("ok")))
        .config(fast_config())
        .job_store(storage.clone())
        .recover_on_start(false)
        .build()
        .unwrap();
    assert_eq!(queue.get_stats().total, 0);

    assert_eq!(queue.load_pending_jobs().await.unwrap(), 1);
    queue.wait_for_idle().await;
    assert_eq!(queue.get_stats().completed, 1);

    // Jobs already known in memory are not resumed twice.
    let mut again = queue.jobs_for_execution("exec-1").remove(0);
    again.status = JobStatus::Pending;
    storage.update_job(&again).await.unwrap();
    assert_eq!(queue.load_pending_jobs().await.unwrap(), 0);
}

#[tokio::test]
async fn test_load_pending_jobs_without_store() {
    let storage = Arc::new(InMemoryStorage::new());
    let queue = queue_over(&storage, Arc::new(StaticGenerator::new("ok")), fast_config());
    assert_eq!(queue.load_pending_jobs().await.unwrap(), 0);
}

#[tokio::test]
async fn test_job_store_failures_are_swallowed() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();

    let mut store = MockJobStore::new();
    store
        .expect_save_job()
        .times(1)
        .returning(|_| Err(StorageError::backend("jobs table unavailable")));
    store
        .expect_update_job()
        .returning(|_| Err(StorageError::backend("jobs table unavailable")));
    store
        .expect_get_jobs_by_status()
        .returning(|_| Err(StorageError::backend("jobs table unavailable")));

    let queue = ReasoningQueue::builder(storage.clone(), Arc::new(StaticGenerator::new("ok")))
        .config(fast_config())
        .job_store(Arc::new(store))
        .build()
        .unwrap();

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    assert_eq!(queue.get_job(&job_id).unwrap().status, JobStatus::Completed);
    assert_eq!(stored_reasoning(&storage, "exec-1", 0).await.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_job_store_sees_every_transition() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();

    let mut store = MockJobStore::new();
    store.expect_save_job().times(1).returning(|_| Ok(()));
    // processing -> pending (retry) -> processing -> completed
    store.expect_update_job().times(4).returning(|_| Ok(()));

    let generator = Arc::new(MockGenerator::replying("ok").failing_first(1, "ETIMEDOUT"));
    let queue = ReasoningQueue::builder(storage, generator)
        .config(fast_config())
        .job_store(Arc::new(store))
        .recover_on_start(false)
        .build()
        .unwrap();

    queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;
    assert_eq!(queue.get_stats().completed, 1);
}

#[tokio::test]
async fn test_lifecycle_events() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let sink = Arc::new(CollectingEventSink::new());
    let generator = Arc::new(MockGenerator::replying("ok").failing_first(1, "ETIMEDOUT"));
    let queue = ReasoningQueue::builder(storage, generator)
        .config(fast_config())
        .event_sink(sink.clone())
        .build()
        .unwrap();

    let job_id = queue.enqueue("exec-1", "fetch").await;
    queue.wait_for_idle().await;

    assert_eq!(
        sink.names(),
        vec![
            event_types::JOB_ENQUEUED,
            event_types::JOB_STARTED,
            event_types::JOB_RETRY_SCHEDULED,
            event_types::JOB_STARTED,
            event_types::JOB_COMPLETED,
        ]
    );

    let data = sink.last(event_types::JOB_RETRY_SCHEDULED).unwrap().data;
    assert_eq!(data["job_id"], job_id.as_str());
    assert_eq!(data["attempt"], 2);
    assert_eq!(data["error"], "ETIMEDOUT");
}

#[tokio::test]
async fn test_stats_and_clear() {
    let storage = seeded_storage([execution_with_steps("exec-1", 2)]).await.unwrap();
    let generator = Arc::new(MockGenerator::replying("ok"));
    generator.push_failure("invalid input format");
    let queue = queue_over(&storage, generator, fast_config().with_concurrency(1));

    queue.process_execution("exec-1").await.unwrap();

    let stats = queue.get_stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total, 2);

    let json = serde_json::to_value(stats).unwrap();
    assert_eq!(json["failed"], 1);

    queue.clear();
    let stats = queue.get_stats();
    assert_eq!(stats.completed + stats.failed + stats.pending + stats.processing, 0);
    assert_eq!(stats.total, 2);
    assert!(queue.jobs_for_execution("exec-1").is_empty());
}

#[tokio::test]
async fn test_clear_drops_scheduled_retries() {
    let storage = seeded_storage([sample_execution("exec-1")]).await.unwrap();
    let generator = Arc::new(MockGenerator::failing("ETIMEDOUT"));
    let queue = queue_over(
        &storage,
        generator.clone(),
        fast_config().with_retry_delays_ms([50]),
    );

    queue.enqueue("exec-1", "fetch").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.clear();
    queue.wait_for_idle().await;

    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let storage = Arc::new(InMemoryStorage::new());
    let err = ReasoningQueue::start(
        storage,
        Arc::new(StaticGenerator::new("ok")),
        QueueConfig::new().with_concurrency(0),
    )
    .unwrap_err();
    assert!(matches!(err, XRayError::Config(_)));
}

#[test]
fn test_build_outside_runtime_skips_recovery() {
    let storage = Arc::new(InMemoryStorage::new());
    let queue = ReasoningQueue::builder(storage.clone(), Arc::new(StaticGenerator::new("ok")))
        .job_store(storage)
        .build()
        .unwrap();
    assert_eq!(queue.get_stats(), QueueStats::default());
}

fn echoing_input_generator() -> FnGenerator {
    FnGenerator::new(|step| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(format!("explains {}", step.input))
    })
}

#[tokio::test]
async fn test_repeated_step_names_get_their_own_reasoning() {
    let mut execution = Execution::new("exec-1", Metadata::new());
    execution.steps.push(sample_step("rank", json!("first"), json!([1])));
    execution.steps.push(sample_step("rank", json!("second"), json!([2])));
    let storage = seeded_storage([execution]).await.unwrap();
    let queue = queue_over(&storage, Arc::new(echoing_input_generator()), fast_config());

    let job_ids = queue.process_execution("exec-1").await.unwrap();

    assert_eq!(job_ids.len(), 2);
    assert_eq!(
        stored_reasoning(&storage, "exec-1", 0).await.as_deref(),
        Some("explains \"first\"")
    );
    assert_eq!(
        stored_reasoning(&storage, "exec-1", 1).await.as_deref(),
        Some("explains \"second\"")
    );
    assert_eq!(queue.get_stats().completed, 2);
}

#[tokio::test]
async fn test_rerun_step_reasoning_stays_aligned() {
    let storage = Arc::new(InMemoryStorage::new());
    let queue = queue_over(&storage, Arc::new(echoing_input_generator()), fast_config());

    let mut xray = XRay::new("exec-1", Metadata::new()).with_storage(storage.clone());
    for input in ["a", "b", "c"] {
        xray.start_step("rank", json!(input)).unwrap();
        xray.end_step("rank", json!(null));
    }
    xray.end(json!(null));
    xray.save().await.unwrap();
    xray.enqueue_reasoning(&queue).await;
    queue.wait_for_idle().await;

    for (idx, input) in ["a", "b", "c"].into_iter().enumerate() {
        assert_eq!(
            stored_reasoning(&storage, "exec-1", idx).await,
            Some(format!("explains \"{input}\""))
        );
    }
}
