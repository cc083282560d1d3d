//! Bounded job runner.
//!
//! [`run`] schedules every item of a batch at once, lets at most
//! `max_concurrency` processor invocations be active at the same time, and
//! returns one [`JobResult`] per item ordered by the item's original index.
//! A failing (or panicking) processor only ever produces a `Failure` for its
//! own item.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::RunnerError;

/// One unit of input together with its position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<T> {
    pub index: usize,
    pub input: T,
}

/// Outcome of processing a single [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum JobResult<V> {
    Success { index: usize, value: V },
    Failure { index: usize, error: String },
}

impl<V> JobResult<V> {
    pub fn index(&self) -> usize {
        match self {
            JobResult::Success { index, .. } | JobResult::Failure { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            JobResult::Success { value, .. } => Some(value),
            JobResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            JobResult::Success { .. } => None,
            JobResult::Failure { error, .. } => Some(error.as_str()),
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            JobResult::Success { value, .. } => Some(value),
            JobResult::Failure { .. } => None,
        }
    }
}

/// Process `items` with at most `max_concurrency` processor calls in flight.
///
/// Every item is spawned immediately; a semaphore permit is acquired before
/// the processor runs and dropped as soon as it returns, whatever the
/// outcome. The returned vector always has `items.len()` entries sorted by
/// index. Only an invalid `max_concurrency` makes this function fail.
pub async fn run<T, V, E, F, Fut>(
    items: Vec<T>,
    processor: F,
    max_concurrency: usize,
) -> Result<Vec<JobResult<V>>, RunnerError>
where
    T: Send + 'static,
    V: Send + 'static,
    E: fmt::Display + 'static,
    F: Fn(WorkItem<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    if max_concurrency == 0 {
        return Err(RunnerError::InvalidConcurrency(max_concurrency));
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    debug!(total, max_concurrency, "scheduling batch");

    let gate = Arc::new(Semaphore::new(max_concurrency));
    let processor = Arc::new(processor);

    let handles: Vec<JoinHandle<JobResult<V>>> = items
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let gate = Arc::clone(&gate);
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return JobResult::Failure {
                            index,
                            error: e.to_string(),
                        };
                    }
                };
                match processor(WorkItem { index, input }).await {
                    Ok(value) => JobResult::Success { index, value },
                    Err(e) => {
                        let error = e.to_string();
                        warn!(index, %error, "work item failed");
                        JobResult::Failure { index, error }
                    }
                }
            })
        })
        .collect();

    let mut results = Vec::with_capacity(total);
    for (index, handle) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                let error = if join_err.is_panic() {
                    format!(
                        "processor panicked: {}",
                        panic_message(join_err.into_panic())
                    )
                } else {
                    join_err.to_string()
                };
                error!(index, %error, "work item task did not finish");
                JobResult::Failure { index, error }
            }
        };
        results.push(result);
    }

    results.sort_by_key(JobResult::index);
    debug!(total, "batch finished");
    Ok(results)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
