use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Spawns one task per dequeued record.
///
/// `Unbounded` matches the historical behaviour: every record gets its own task and
/// nothing caps how many run at once. `Bounded` makes the dispatcher wait for a free
/// slot before spawning, which pushes back onto the transport instead.
#[derive(Debug, Clone)]
pub enum WorkerPool {
    Unbounded,
    Bounded(Arc<Semaphore>),
}

impl WorkerPool {
    pub fn new(max_tasks: Option<usize>) -> Self {
        match max_tasks {
            Some(n) if n > 0 => WorkerPool::Bounded(Arc::new(Semaphore::new(n))),
            _ => WorkerPool::Unbounded,
        }
    }

    pub async fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            WorkerPool::Unbounded => tokio::spawn(task),
            WorkerPool::Bounded(slots) => match Arc::clone(slots).acquire_owned().await {
                Ok(permit) => tokio::spawn(async move {
                    task.await;
                    drop(permit);
                }),
                // the semaphore is never closed
                Err(_) => tokio::spawn(task),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn peak_concurrency(pool: WorkerPool, tasks: usize) -> usize {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..tasks {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(
                pool.spawn(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await,
            );
        }
        for handle in handles {
            handle.await.unwrap();
        }
        peak.load(Ordering::SeqCst)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_pool_caps_concurrency() {
        let peak = peak_concurrency(WorkerPool::new(Some(2)), 8).await;
        assert!(peak <= 2, "peak was {peak}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_unbounded_pool_fans_out() {
        let peak = peak_concurrency(WorkerPool::new(None), 8).await;
        assert!(peak > 2, "peak was {peak}");
    }

    #[test]
    fn test_zero_means_unbounded() {
        assert!(matches!(WorkerPool::new(Some(0)), WorkerPool::Unbounded));
    }
}
