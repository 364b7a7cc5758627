use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::PulseError;

/// Bounded pool for blocking work (subprocesses, container inspection, ping).
///
/// Jobs run on tokio's blocking threads; the semaphore caps how many run at once
/// so a large resource set cannot fork an unbounded number of children.
#[derive(Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
    /// Slack added to every [`BlockingPool::run_within`] deadline
    grace: Duration,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { permits: Arc::new(Semaphore::new(size)), size, grace: DEFAULT_GRACE }
    }

    /// Same slots, different deadline slack
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Currently free slots
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, PulseError> {
        self.permits.clone().acquire_owned().await.map_err(|_| PulseError::PoolClosed)
    }

    /// Run a blocking job once a slot is free
    pub async fn run<F, T>(&self, job: F) -> Result<T, PulseError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        Ok(handle.await?)
    }

    /// Run a blocking job and wait at most `budget` plus grace for it.
    ///
    /// The clock starts once a slot is held. On expiry the job is detached and
    /// keeps its slot until it returns.
    pub async fn run_within<F, T>(&self, budget: Duration, job: F) -> Result<T, PulseError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        let deadline = budget + self.grace;
        match tokio::time::timeout(deadline, handle).await {
            Ok(joined) => Ok(joined?),
            Err(_) => Err(PulseError::Deadline(deadline)),
        }
    }

    /// Refuse new jobs. Jobs already running are not interrupted.
    pub fn close(&self) {
        self.permits.close();
    }
}

const DEFAULT_GRACE: Duration = Duration::from_millis(500);

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(8)
    }
}

impl std::fmt::Debug for BlockingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPool")
            .field("size", &self.size)
            .field("available", &self.available())
            .field("grace", &self.grace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_pool_caps_concurrency() {
        let pool = BlockingPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }
        });

        let results = futures::future::join_all(jobs).await;
        assert!(results.iter().all(Result::is_ok));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_jobs() {
        let pool = BlockingPool::new(1);
        pool.close();

        let result = pool.run(|| 1).await;
        assert!(matches!(result, Err(PulseError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_deadline_starts_when_slot_is_held() {
        let pool = BlockingPool::new(1).with_grace(Duration::from_millis(50));

        let busy = pool.run(|| std::thread::sleep(Duration::from_millis(400)));
        let queued = pool.run_within(Duration::from_millis(100), || 7);

        let (busy, queued) = tokio::join!(busy, queued);
        assert!(busy.is_ok());
        assert_eq!(queued.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_run_within_expires() {
        let pool = BlockingPool::new(1).with_grace(Duration::ZERO);

        let result = pool.run_within(Duration::from_millis(50), || std::thread::sleep(Duration::from_millis(300))).await;
        assert!(matches!(result, Err(PulseError::Deadline(deadline)) if deadline == Duration::from_millis(50)));
        // the detached job still owns its slot
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(BlockingPool::new(0).size(), 1);
    }
}
