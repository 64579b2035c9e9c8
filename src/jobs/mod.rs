//! Job execution used by the schedulers: submit station jobs, wait for the whole
//! batch, then collect each result by handle.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::warn;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

pub type Job<T> = BoxFuture<'static, T>;

/// Identifies a submitted job within one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(u64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job was cancelled before it finished")]
    Cancelled,

    #[error("No result available for job {0:?}")]
    Missing(JobHandle),
}

#[async_trait]
pub trait JobExecutor<T: Send + 'static>: Send {
    fn submit(&mut self, job: Job<T>) -> JobHandle;

    /// Returns once every submitted job has finished.
    async fn wait_all(&mut self);

    /// Takes the result of a finished job. Each result can be taken once.
    fn result(&mut self, handle: JobHandle) -> Result<T, JobError>;
}

impl From<tokio::task::JoinError> for JobError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            JobError::Panicked(panic_message(error.into_panic().as_ref()))
        } else {
            JobError::Cancelled
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs jobs on the tokio runtime with at most `workers` running at once.
pub struct TokioJobPool<T> {
    permits: Arc<Semaphore>,
    running: JoinSet<T>,
    tasks: HashMap<Id, JobHandle>,
    finished: HashMap<JobHandle, Result<T, JobError>>,
    next: u64,
}

impl<T: Send + 'static> TokioJobPool<T> {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            running: JoinSet::new(),
            tasks: HashMap::new(),
            finished: HashMap::new(),
            next: 0,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }
}

#[async_trait]
impl<T: Send + 'static> JobExecutor<T> for TokioJobPool<T> {
    fn submit(&mut self, job: Job<T>) -> JobHandle {
        let handle = JobHandle(self.next);
        self.next += 1;

        let permits = self.permits.clone();
        let task = self.running.spawn(async move {
            // the semaphore is never closed
            let _permit = permits.acquire_owned().await;
            job.await
        });
        self.tasks.insert(task.id(), handle);
        handle
    }

    async fn wait_all(&mut self) {
        while let Some(joined) = self.running.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, value)) => (id, Ok(value)),
                Err(e) => (e.id(), Err(JobError::from(e))),
            };
            match self.tasks.remove(&id) {
                Some(handle) => {
                    self.finished.insert(handle, outcome);
                }
                None => warn!("Finished task {} does not belong to any job", id),
            }
        }
    }

    fn result(&mut self, handle: JobHandle) -> Result<T, JobError> {
        self.finished
            .remove(&handle)
            .unwrap_or(Err(JobError::Missing(handle)))
    }
}

/// Runs jobs one after another inside `wait_all`, in submission order.
pub struct InlineExecutor<T> {
    queued: Vec<(JobHandle, Job<T>)>,
    finished: HashMap<JobHandle, Result<T, JobError>>,
    next: u64,
}

impl<T> Default for InlineExecutor<T> {
    fn default() -> Self {
        Self {
            queued: Vec::new(),
            finished: HashMap::new(),
            next: 0,
        }
    }
}

impl<T> InlineExecutor<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: Send + 'static> JobExecutor<T> for InlineExecutor<T> {
    fn submit(&mut self, job: Job<T>) -> JobHandle {
        let handle = JobHandle(self.next);
        self.next += 1;
        self.queued.push((handle, job));
        handle
    }

    async fn wait_all(&mut self) {
        for (handle, job) in std::mem::take(&mut self.queued) {
            let outcome = AssertUnwindSafe(job)
                .catch_unwind()
                .await
                .map_err(|payload| JobError::Panicked(panic_message(payload.as_ref())));
            self.finished.insert(handle, outcome);
        }
    }

    fn result(&mut self, handle: JobHandle) -> Result<T, JobError> {
        self.finished
            .remove(&handle)
            .unwrap_or(Err(JobError::Missing(handle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn run_batch(executor: &mut dyn JobExecutor<usize>) -> Vec<Result<usize, JobError>> {
        let handles: Vec<_> = (0..6usize)
            .map(|i| {
                executor.submit(
                    async move {
                        if i == 3 {
                            panic!("job {} failed", i);
                        }
                        i * 10
                    }
                    .boxed(),
                )
            })
            .collect();
        executor.wait_all().await;
        handles.into_iter().map(|h| executor.result(h)).collect()
    }

    fn expected() -> Vec<Result<usize, JobError>> {
        vec![
            Ok(0),
            Ok(10),
            Ok(20),
            Err(JobError::Panicked("job 3 failed".to_string())),
            Ok(40),
            Ok(50),
        ]
    }

    #[tokio::test]
    async fn test_tokio_pool_collects_results_by_handle() {
        let mut pool = TokioJobPool::new(2);
        assert_eq!(run_batch(&mut pool).await, expected());
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_inline_executor_collects_results_by_handle() {
        let mut inline = InlineExecutor::new();
        assert_eq!(run_batch(&mut inline).await, expected());
    }

    #[tokio::test]
    async fn test_results_are_taken_once() {
        let mut inline = InlineExecutor::new();
        let handle = inline.submit(async { 1usize }.boxed());
        assert_eq!(inline.result(handle), Err(JobError::Missing(handle)));
        inline.wait_all().await;
        assert_eq!(inline.result(handle), Ok(1));
        assert_eq!(inline.result(handle), Err(JobError::Missing(handle)));
    }

    #[tokio::test]
    async fn test_pool_respects_worker_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut pool = TokioJobPool::new(3);
        for _ in 0..12 {
            let running = running.clone();
            let peak = peak.clone();
            pool.submit(
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        pool.wait_all().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }
}
