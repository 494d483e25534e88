//! Bounded concurrent execution of independent tasks.
//!
//! [`Executor::join`] runs a batch of futures on at most `concurrency`
//! workers and returns their results in input order, or the first error.
//!
//! Tasks may call `join` on the same executor again (a multipart upload
//! joins its parts from inside the upload task). The calling task holds a
//! worker slot while it waits, so a pool saturated by such callers would
//! never admit the nested tasks. A nested join therefore adds one permit
//! for its duration and takes one back when it finishes; the pool may
//! briefly run one extra task per nested join.
//!
//! A concurrency of zero or less runs every task sequentially, in order, on
//! the caller's task.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::trace;

use crate::error::ExecutorError;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: i64 = 5;

tokio::task_local! {
    /// Identity of the pool whose worker is running the current task.
    static WORKER_OF: usize;
}

/// A bounded worker pool.
#[derive(Debug, Clone)]
pub struct Executor {
    semaphore: Option<Arc<Semaphore>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl Executor {
    /// Create a pool of `concurrency` workers; `<= 0` means sequential.
    #[must_use]
    pub fn new(concurrency: i64) -> Self {
        let semaphore = usize::try_from(concurrency)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        Self { semaphore }
    }

    /// A pool that runs everything sequentially.
    #[must_use]
    pub fn sequential() -> Self {
        Self { semaphore: None }
    }

    /// Whether tasks run one after another on the caller's task.
    #[must_use]
    pub fn is_sequential(&self) -> bool {
        self.semaphore.is_none()
    }

    /// Run every task and collect their results in input order.
    ///
    /// In sequential mode the first error is returned immediately and later
    /// tasks never start. In concurrent mode the first failure stops tasks
    /// that have not started yet; tasks already running finish, their
    /// results are discarded, and the first error is returned once every
    /// spawned task has been accounted for.
    pub async fn join<I, Fut, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<ExecutorError> + Send + 'static,
    {
        match &self.semaphore {
            None => {
                let mut results = Vec::new();
                for task in tasks {
                    results.push(task.await?);
                }
                Ok(results)
            }
            Some(semaphore) => Self::join_concurrent(semaphore, tasks).await,
        }
    }

    async fn join_concurrent<I, Fut, T, E>(semaphore: &Arc<Semaphore>, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<ExecutorError> + Send + 'static,
    {
        let pool_id = Arc::as_ptr(semaphore) as usize;
        let nested = WORKER_OF.try_with(|id| *id == pool_id).unwrap_or(false);
        if nested {
            trace!("nested join, lending the caller's slot");
            semaphore.add_permits(1);
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let mut set = JoinSet::new();
        let mut count = 0;
        for (index, task) in tasks.into_iter().enumerate() {
            count += 1;
            let semaphore = Arc::clone(semaphore);
            let cancelled = Arc::clone(&cancelled);
            set.spawn(WORKER_OF.scope(pool_id, async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| E::from(ExecutorError::Closed))?;
                if cancelled.load(Ordering::Acquire) {
                    return Ok::<_, E>(None);
                }
                match task.await {
                    Ok(value) => Ok(Some((index, value))),
                    Err(err) => {
                        cancelled.store(true, Ordering::Release);
                        Err(err)
                    }
                }
            }));
        }

        let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(count).collect();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(Some((index, value)))) => slots[index] = Some(value),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(join_error) => {
                    cancelled.store(true, Ordering::Release);
                    first_error.get_or_insert(E::from(ExecutorError::TaskFailed(
                        join_error.to_string(),
                    )));
                }
            }
        }

        if nested {
            if let Ok(permit) = semaphore.acquire().await {
                permit.forget();
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    E::from(ExecutorError::TaskFailed("task produced no result".to_owned()))
                })
            })
            .collect()
    }
}
