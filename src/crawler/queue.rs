//! Bounded task queue for page fetches
//!
//! Tasks wait for a concurrency slot and a rate-limit permit before they
//! start. Closing the queue makes every waiting task exit without running.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Per-second start budget
///
/// A background task tops the bucket back up to `per_second` permits every
/// second. Permits are consumed, never returned.
#[derive(Debug)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    refill: JoinHandle<()>,
}

impl RateLimiter {
    /// Must be called inside a tokio runtime
    pub fn new(per_second: usize) -> Self {
        let per_second = per_second.max(1);
        let permits = Arc::new(Semaphore::new(per_second));

        let bucket = permits.clone();
        let refill = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if bucket.is_closed() {
                    break;
                }
                let available = bucket.available_permits();
                bucket.add_permits(per_second.saturating_sub(available));
            }
        });

        Self { permits, refill }
    }

    fn bucket(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }

    fn close(&self) {
        self.permits.close();
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.permits.close();
        self.refill.abort();
    }
}

/// Shared task queue bounded by concurrency and start rate
///
/// Every submitted task waits for a concurrency slot, then for a rate
/// permit. Closing the queue makes waiting tasks exit without running;
/// tasks already running are not interrupted.
#[derive(Debug)]
pub struct TaskQueue {
    slots: Arc<Semaphore>,
    limiter: RateLimiter,
}

impl TaskQueue {
    pub fn new(concurrency: usize, per_second: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(concurrency.max(1))),
            limiter: RateLimiter::new(per_second),
        }
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let slots = self.slots.clone();
        let bucket = self.limiter.bucket();

        tokio::spawn(async move {
            let Ok(_slot) = slots.acquire_owned().await else {
                return;
            };
            match bucket.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return,
            }
            task.await;
        });
    }

    pub fn close(&self) {
        self.slots.close();
        self.limiter.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}
