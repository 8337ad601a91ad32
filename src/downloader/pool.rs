// Named worker pools with bounded parallelism

use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::debug;

/// A named, bounded pool of concurrent tasks.
///
/// Results come back in completion order, not submission order. One task's
/// failure is its own business: `run` only sees the values the futures
/// resolve to.
pub struct WorkerPool {
    name: &'static str,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, concurrency: usize) -> Self {
        Self {
            name,
            concurrency: concurrency.max(1),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drive all `tasks` with at most `concurrency` in flight, collecting
    /// their outputs as they finish.
    pub async fn run<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        let total = tasks.len();
        debug!(
            pool = self.name,
            tasks = total,
            concurrency = self.concurrency,
            "dispatching"
        );

        let results: Vec<T> = stream::iter(tasks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        debug!(pool = self.name, tasks = total, "drained");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn collects_results_in_completion_order() {
        let pool = WorkerPool::new("test", 3);
        let tasks: Vec<_> = vec![30u64, 10, 20]
            .into_iter()
            .map(|ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            })
            .collect();

        let results = pool.run(tasks).await;
        assert_eq!(results, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn never_exceeds_the_configured_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pool = WorkerPool::new("test", 2);
        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        pool.run(tasks).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let pool = WorkerPool::new("test", 0);
        assert_eq!(pool.concurrency(), 1);
        let results = pool.run(vec![async { 42 }]).await;
        assert_eq!(results, vec![42]);
    }
}
