//! Mock reasoning generators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::Step;
use crate::errors::GenerationError;
use crate::reasoning::ReasoningGenerator;

/// A generator that replays a script of results, then a default result.
///
/// Failures are scripted as plain messages and surface as
/// [`GenerationError::Failed`], so they are classified by their text.
#[derive(Debug)]
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, String>>>,
    fallback: Mutex<Result<String, String>>,
    call_count: AtomicUsize,
    steps: Mutex<Vec<String>>,
}

impl MockGenerator {
    fn with_fallback(fallback: Result<String, String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            call_count: AtomicUsize::new(0),
            steps: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that always replies with `reasoning`.
    #[must_use]
    pub fn replying(reasoning: impl Into<String>) -> Self {
        Self::with_fallback(Ok(reasoning.into()))
    }

    /// Creates a mock that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Err(message.into()))
    }

    /// Fails the next `times` calls with `message` before the default result.
    #[must_use]
    pub fn failing_first(self, times: usize, message: impl Into<String>) -> Self {
        let message = message.into();
        self.script
            .lock()
            .extend(std::iter::repeat(Err(message)).take(times));
        self
    }

    /// Appends a reply to the script.
    pub fn push_reply(&self, reasoning: impl Into<String>) {
        self.script.lock().push_back(Ok(reasoning.into()));
    }

    /// Appends a failure to the script.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    /// Returns the number of times the generator was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the step names seen, in call order.
    #[must_use]
    pub fn called_steps(&self) -> Vec<String> {
        self.steps.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        self.steps.lock().clear();
    }
}

#[async_trait]
impl ReasoningGenerator for MockGenerator {
    async fn generate(&self, step: &Step) -> Result<String, GenerationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.steps.lock().push(step.name.clone());

        let next = self.script.lock().pop_front();
        let result = next.unwrap_or_else(|| self.fallback.lock().clone());
        result.map_err(GenerationError::failed)
    }
}

/// A generator that always returns the same reasoning.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    reasoning: String,
}

impl StaticGenerator {
    /// Creates a new static generator.
    #[must_use]
    pub fn new(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
        }
    }
}

#[async_trait]
impl ReasoningGenerator for StaticGenerator {
    async fn generate(&self, _step: &Step) -> Result<String, GenerationError> {
        Ok(self.reasoning.clone())
    }
}

/// A generator that always fails.
#[derive(Debug, Clone)]
pub struct FailingGenerator {
    message: String,
    code: Option<String>,
    status: Option<u16>,
}

impl FailingGenerator {
    /// Creates a generator failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Adds an error code to the failure.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Adds an HTTP status to the failure.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[async_trait]
impl ReasoningGenerator for FailingGenerator {
    async fn generate(&self, _step: &Step) -> Result<String, GenerationError> {
        let mut err = GenerationError::failed(self.message.clone());
        if let Some(code) = &self.code {
            err = err.with_code(code.clone());
        }
        if let Some(status) = self.status {
            err = err.with_status(status);
        }
        Err(err)
    }
}

/// A generator that takes time to answer and tracks overlapping calls.
#[derive(Debug)]
pub struct SlowGenerator {
    delay: Duration,
    reasoning: String,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    call_count: AtomicUsize,
}

impl SlowGenerator {
    /// Creates a generator answering `reasoning` after `delay`.
    #[must_use]
    pub fn new(delay: Duration, reasoning: impl Into<String>) -> Self {
        Self {
            delay,
            reasoning: reasoning.into(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
        }
    }

    /// Creates a slow generator with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms), "slow reasoning")
    }

    /// Returns the highest number of calls observed running at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the number of calls started.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningGenerator for SlowGenerator {
    async fn generate(&self, _step: &Step) -> Result<String, GenerationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.reasoning.clone())
    }
}
