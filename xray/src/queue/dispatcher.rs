//! Bounded-concurrency task dispatcher with idle tracking.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Runs submitted tasks with at most `concurrency` executing at once.
///
/// Every submission counts as outstanding from the moment it is accepted
/// (including any start delay) until its task finishes, so
/// [`Dispatcher::wait_idle`] only returns once nothing is queued, delayed, or
/// running.
#[derive(Debug)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    concurrency: usize,
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Decrements the outstanding count when dropped, even if the task panics.
struct Outstanding(Arc<Dispatcher>);

impl Drop for Outstanding {
    fn drop(&mut self) {
        if self.0.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl Dispatcher {
    /// Creates a dispatcher allowing `concurrency` tasks to run at once.
    #[must_use]
    pub fn new(concurrency: usize) -> Arc<Self> {
        let concurrency = concurrency.max(1);
        Arc::new(Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
        })
    }

    /// Returns the configured concurrency.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the number of queued, delayed, or running tasks.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks currently holding a slot.
    #[must_use]
    pub fn running(&self) -> usize {
        self.concurrency - self.permits.available_permits()
    }

    fn track(self: &Arc<Self>) -> Outstanding {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        Outstanding(Arc::clone(self))
    }

    /// Submits a task that runs once a slot is free.
    pub fn submit<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submit_after(Duration::ZERO, task);
    }

    /// Submits a task that becomes eligible for a slot after `delay`.
    ///
    /// The delay is spent without holding a slot.
    pub fn submit_after<F>(self: &Arc<Self>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track();
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _guard = guard;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let Ok(_permit) = permits.acquire_owned().await else {
                tracing::warn!("Dispatcher closed, dropping task");
                return;
            };
            task.await;
        });
    }

    /// Runs a background task that counts as outstanding but takes no slot.
    pub fn spawn_tracked<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Waits until no task is queued, delayed, or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}
