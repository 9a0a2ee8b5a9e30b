//! Bounded concurrency for layout engine calls.

use std::{future::Future, sync::Arc};

use tokio::sync::Semaphore;

/// Caps how many tasks run at the same time.
///
/// Tasks beyond the limit wait in submission order and start as slots free
/// up. The closure passed to [`ConcurrencyLimiter::run`] is only called once
/// a slot is granted, so queued work does not start early. A failing or
/// panicking task releases its slot like any other.
///
/// Cloning yields another handle to the same set of slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyLimiter {
    /// Default number of simultaneous layout calls.
    pub const DEFAULT_LIMIT: usize = 4;

    /// Creates a limiter admitting `limit` tasks at once (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Returns the configured bound.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a slot, then creates and runs the task while holding it.
    pub async fn run<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .expect("Limiter semaphore is never closed");
        task().await
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}
