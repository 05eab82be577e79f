//! The reasoning queue and its builder.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::classify::classify_error;
use super::config::QueueConfig;
use super::dispatcher::Dispatcher;
use super::job::{QueueStats, ReasoningJob};
use crate::core::{JobStatus, Step};
use crate::errors::{GenerationError, NotFoundError, Result, XRayError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::observability::{JobSpanAttributes, SpanTimer};
use crate::reasoning::ReasoningGenerator;
use crate::storage::{JobStore, StorageProvider};
use crate::utils::{after, now_utc};

/// Builder for [`ReasoningQueue`].
pub struct ReasoningQueueBuilder {
    storage: Arc<dyn StorageProvider>,
    generator: Arc<dyn ReasoningGenerator>,
    config: QueueConfig,
    job_store: Option<Arc<dyn JobStore>>,
    events: Option<Arc<dyn EventSink>>,
    recover_on_start: bool,
}

impl ReasoningQueueBuilder {
    /// Sets the queue configuration.
    #[must_use]
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirrors job state to `job_store` and enables recovery from it.
    #[must_use]
    pub fn job_store(mut self, job_store: Arc<dyn JobStore>) -> Self {
        self.job_store = Some(job_store);
        self
    }

    /// Sets the sink receiving job lifecycle events.
    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Whether `build` reloads persisted pending jobs in the background (default true).
    #[must_use]
    pub fn recover_on_start(mut self, recover: bool) -> Self {
        self.recover_on_start = recover;
        self
    }

    /// Builds the queue.
    ///
    /// When a job store is configured and a tokio runtime is available,
    /// persisted pending and processing jobs are reloaded in the background;
    /// construction never waits for them.
    ///
    /// # Errors
    ///
    /// Returns [`XRayError::Config`] if the configuration is invalid.
    pub fn build(self) -> Result<ReasoningQueue> {
        self.config.validate()?;

        let queue = ReasoningQueue {
            inner: Arc::new(QueueInner {
                jobs: DashMap::new(),
                storage: self.storage,
                job_store: self.job_store,
                generator: self.generator,
                dispatcher: Dispatcher::new(self.config.concurrency),
                config: self.config,
                events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
                total: AtomicUsize::new(0),
                step_locks: DashMap::new(),
            }),
        };

        if self.recover_on_start && queue.inner.job_store.is_some() {
            if tokio::runtime::Handle::try_current().is_ok() {
                let recovering = queue.clone();
                queue.inner.dispatcher.spawn_tracked(async move {
                    if let Err(err) = recovering.load_pending_jobs().await {
                        warn!(error = %err, "Failed to recover pending reasoning jobs");
                    }
                });
            } else {
                warn!("No tokio runtime available, skipping reasoning job recovery");
            }
        }

        Ok(queue)
    }
}

struct QueueInner {
    jobs: DashMap<String, ReasoningJob>,
    storage: Arc<dyn StorageProvider>,
    job_store: Option<Arc<dyn JobStore>>,
    generator: Arc<dyn ReasoningGenerator>,
    config: QueueConfig,
    dispatcher: Arc<Dispatcher>,
    events: Arc<dyn EventSink>,
    total: AtomicUsize,
    /// One lock per `(execution_id, step_name)` held from step lookup to write-back.
    step_locks: DashMap<(String, String), Arc<tokio::sync::Mutex<()>>>,
}

/// Asynchronous, retrying reasoning generation for stored steps.
///
/// Cloning is cheap; clones share the same jobs, dispatcher and collaborators.
///
/// Job failures never surface to callers of [`enqueue`](Self::enqueue). They
/// are observable through [`get_job`](Self::get_job), [`get_stats`](Self::get_stats),
/// events and logs, and the step simply keeps no reasoning.
#[derive(Clone)]
pub struct ReasoningQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for ReasoningQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningQueue")
            .field("config", &self.inner.config)
            .field("stats", &self.get_stats())
            .finish_non_exhaustive()
    }
}

impl ReasoningQueue {
    /// Starts building a queue over `storage` and `generator`.
    #[must_use]
    pub fn builder(
        storage: Arc<dyn StorageProvider>,
        generator: Arc<dyn ReasoningGenerator>,
    ) -> ReasoningQueueBuilder {
        ReasoningQueueBuilder {
            storage,
            generator,
            config: QueueConfig::default(),
            job_store: None,
            events: None,
            recover_on_start: true,
        }
    }

    /// Builds a queue with `config` and no job store.
    ///
    /// # Errors
    ///
    /// Returns [`XRayError::Config`] if the configuration is invalid.
    pub fn start(
        storage: Arc<dyn StorageProvider>,
        generator: Arc<dyn ReasoningGenerator>,
        config: QueueConfig,
    ) -> Result<Self> {
        Self::builder(storage, generator).config(config).build()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Enqueues reasoning generation for one step and returns the job id.
    ///
    /// Returns immediately; the job runs in the background.
    pub async fn enqueue(
        &self,
        execution_id: impl Into<String>,
        step_name: impl Into<String>,
    ) -> String {
        let job = ReasoningJob::new(execution_id, step_name);
        let job_id = job.id.clone();

        self.inner.jobs.insert(job_id.clone(), job.clone());
        self.inner.total.fetch_add(1, Ordering::SeqCst);

        if let Some(store) = &self.inner.job_store {
            if let Err(err) = store.save_job(&job).await {
                warn!(job_id = %job.id, error = %err, "Failed to persist reasoning job");
            }
        }

        if self.debug() {
            info!(
                job_id = %job.id,
                execution_id = %job.execution_id,
                step_name = %job.step_name,
                "Enqueued reasoning job"
            );
        }
        self.emit(event_types::JOB_ENQUEUED, &job).await;

        self.schedule(job_id.clone(), Duration::ZERO);
        job_id
    }

    /// Enqueues every step of a stored execution that has no reasoning yet.
    ///
    /// # Errors
    ///
    /// Returns [`XRayError::NotFound`] if the execution does not exist, or a
    /// storage error if it could not be loaded.
    pub async fn enqueue_execution(&self, execution_id: &str) -> Result<Vec<String>> {
        let execution = self
            .inner
            .storage
            .get_execution_by_id(execution_id)
            .await?
            .ok_or_else(|| NotFoundError::execution(execution_id))?;

        let mut job_ids = Vec::new();
        for step in execution.steps_without_reasoning() {
            job_ids.push(self.enqueue(execution_id, step.name.as_str()).await);
        }
        Ok(job_ids)
    }

    /// Enqueues an execution and waits until the queue has no outstanding work.
    ///
    /// # Errors
    ///
    /// Same as [`enqueue_execution`](Self::enqueue_execution).
    pub async fn process_execution(&self, execution_id: &str) -> Result<Vec<String>> {
        let job_ids = self.enqueue_execution(execution_id).await?;
        self.wait_for_idle().await;
        Ok(job_ids)
    }

    /// Waits until no job is queued, delayed for retry, or running.
    pub async fn wait_for_idle(&self) {
        self.inner.dispatcher.wait_idle().await;
    }

    /// Reloads pending and processing jobs from the job store and re-submits them.
    ///
    /// Jobs already known in memory are skipped. Returns the number of resumed jobs.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the job store query fails.
    pub async fn load_pending_jobs(&self) -> Result<usize> {
        let Some(store) = self.inner.job_store.clone() else {
            return Ok(0);
        };

        let persisted = store
            .get_jobs_by_status(&[JobStatus::Pending, JobStatus::Processing])
            .await?;

        let mut resumed = 0;
        for row in persisted {
            let job = row.recovered();
            let job_id = job.id.clone();
            match self.inner.jobs.entry(job_id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(job.clone());
                }
            }
            self.inner.total.fetch_add(1, Ordering::SeqCst);

            if self.debug() {
                info!(job_id = %job.id, attempt = job.attempt, "Recovered reasoning job");
            }
            self.emit(event_types::JOB_RECOVERED, &job).await;
            self.schedule(job_id, Duration::ZERO);
            resumed += 1;
        }

        if resumed > 0 {
            info!(resumed, "Resumed persisted reasoning jobs");
        }
        Ok(resumed)
    }

    /// Counts in-memory jobs by status.
    #[must_use]
    pub fn get_stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.inner.total.load(Ordering::SeqCst),
            ..QueueStats::default()
        };
        for job in self.inner.jobs.iter() {
            stats.record(job.status);
        }
        stats
    }

    /// Returns a snapshot of a job.
    #[must_use]
    pub fn get_job(&self, job_id: &str) -> Option<ReasoningJob> {
        self.inner.jobs.get(job_id).map(|job| job.value().clone())
    }

    /// Returns every in-memory job of an execution, oldest first.
    #[must_use]
    pub fn jobs_for_execution(&self, execution_id: &str) -> Vec<ReasoningJob> {
        let mut jobs: Vec<ReasoningJob> = self
            .inner
            .jobs
            .iter()
            .filter(|job| job.execution_id == execution_id)
            .map(|job| job.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }

    /// Drops all in-memory job state. Persisted jobs are untouched.
    ///
    /// Jobs still queued or delayed become no-ops when they come up.
    pub fn clear(&self) {
        self.inner.jobs.clear();
    }

    fn debug(&self) -> bool {
        self.inner.config.debug
    }

    fn schedule(&self, job_id: String, delay: Duration) {
        let task = self.clone().run(job_id);
        self.inner.dispatcher.submit_after(delay, task);
    }

    fn run(self, job_id: String) -> BoxFuture<'static, ()> {
        async move { self.process_job(&job_id).await }.boxed()
    }

    async fn process_job(&self, job_id: &str) {
        let Some(job) = self.update_job(job_id, |job| {
            if job.status != JobStatus::Pending {
                return false;
            }
            job.status = JobStatus::Processing;
            job.started_at = Some(now_utc());
            job.next_retry_at = None;
            true
        }) else {
            return;
        };

        self.persist(&job).await;
        if self.debug() {
            debug!(job_id = %job.id, attempt = job.attempt, "Processing reasoning job");
        }
        self.emit(event_types::JOB_STARTED, &job).await;

        let timer = SpanTimer::start("reasoning.job");
        let outcome = self.run_job(&job).await;
        let duration_ms = timer.finish();

        match outcome {
            Ok(()) => self.complete(job_id, duration_ms).await,
            Err(err) => self.fail_attempt(job_id, &err, duration_ms).await,
        }
    }

    /// Runs one attempt while holding the lock for the job's step name.
    ///
    /// Read and write both resolve a repeated name to its first unexplained
    /// step, so same-named jobs must not interleave between the two.
    async fn run_job(&self, job: &ReasoningJob) -> Result<()> {
        let key = (job.execution_id.clone(), job.step_name.clone());
        let lock = self.inner.step_locks.entry(key.clone()).or_default().clone();
        let outcome = {
            let _held = lock.lock().await;
            self.explain_step(job).await
        };
        drop(lock);
        self.inner
            .step_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    async fn explain_step(&self, job: &ReasoningJob) -> Result<()> {
        let execution = self
            .inner
            .storage
            .get_execution_by_id(&job.execution_id)
            .await?
            .ok_or_else(|| NotFoundError::execution(&job.execution_id))?;

        let step = execution
            .find_step(&job.step_name)
            .ok_or_else(|| NotFoundError::step(&job.execution_id, &job.step_name))?;

        if step.has_reasoning() {
            if self.debug() {
                debug!(job_id = %job.id, "Step already has reasoning, skipping generation");
            }
            return Ok(());
        }

        let reasoning = self.generate(step).await?;
        self.inner
            .storage
            .update_step_reasoning(&job.execution_id, &job.step_name, &reasoning)
            .await?;
        Ok(())
    }

    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        let call = self.inner.generator.generate(step);
        let reasoning = match self.inner.config.generator_timeout() {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                GenerationError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                }
            })??,
            None => call.await?,
        };

        if reasoning.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(reasoning)
    }

    async fn complete(&self, job_id: &str, duration_ms: f64) {
        let Some(job) = self.update_job(job_id, |job| {
            job.status = JobStatus::Completed;
            job.completed_at = Some(now_utc());
            job.error = None;
            true
        }) else {
            return;
        };

        self.persist(&job).await;
        if self.debug() {
            let attributes = JobSpanAttributes::for_job(&job)
                .with_status(job.status)
                .with_duration_ms(duration_ms)
                .to_attributes();
            info!(job_id = %job.id, ?attributes, "Reasoning job completed");
        }
        self.emit(event_types::JOB_COMPLETED, &job).await;
    }

    async fn fail_attempt(&self, job_id: &str, err: &XRayError, duration_ms: f64) {
        let config = &self.inner.config;
        let retryable = classify_error(err).is_retryable();
        let Some(attempt) = self.inner.jobs.get(job_id).map(|job| job.attempt) else {
            return;
        };
        let retry_delay =
            (retryable && attempt < config.max_retries).then(|| config.delay_for_attempt(attempt));
        let message = err.to_string();

        let Some(job) = self.update_job(job_id, |job| {
            job.error = Some(message.clone());
            if let Some(delay) = retry_delay {
                job.attempt += 1;
                job.status = JobStatus::Pending;
                job.next_retry_at = Some(after(delay));
            } else {
                job.status = JobStatus::Failed;
                job.completed_at = Some(now_utc());
            }
            true
        }) else {
            return;
        };

        self.persist(&job).await;

        if let Some(delay) = retry_delay {
            if self.debug() {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(
                    job_id = %job.id,
                    attempt = job.attempt,
                    delay_ms,
                    error = %message,
                    "Retrying reasoning job"
                );
            }
            self.emit(event_types::JOB_RETRY_SCHEDULED, &job).await;
            self.schedule(job.id.clone(), delay);
        } else {
            let attributes = JobSpanAttributes::for_job(&job)
                .with_status(job.status)
                .with_duration_ms(duration_ms)
                .with_error(message.as_str())
                .to_attributes();
            error!(
                job_id = %job.id,
                execution_id = %job.execution_id,
                step_name = %job.step_name,
                attempt = job.attempt,
                retryable,
                ?attributes,
                "Reasoning job failed"
            );
            self.emit(event_types::JOB_FAILED, &job).await;
        }
    }

    /// Applies `apply` to a job and returns a snapshot if it reported a change.
    ///
    /// The map guard is released before returning, so callers may await freely.
    fn update_job<F>(&self, job_id: &str, apply: F) -> Option<ReasoningJob>
    where
        F: FnOnce(&mut ReasoningJob) -> bool,
    {
        let mut job = self.inner.jobs.get_mut(job_id)?;
        apply(job.value_mut()).then(|| job.value().clone())
    }

    async fn persist(&self, job: &ReasoningJob) {
        let Some(store) = &self.inner.job_store else {
            return;
        };
        if let Err(err) = store.update_job(job).await {
            warn!(
                job_id = %job.id,
                status = %job.status,
                error = %err,
                "Failed to persist reasoning job state"
            );
        }
    }

    async fn emit(&self, event_type: &str, job: &ReasoningJob) {
        self.inner.events.emit(event_type, Some(job.to_event())).await;
    }
}
