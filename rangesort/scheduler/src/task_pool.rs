// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The bounded worker pool shared by all phases.

use std::any::Any;
use std::error::Error;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use log::{error, info};
use rangesort_core::error::{RangeSortError, Result};
use rangesort_core::phase::Phase;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::report::{PhaseReport, TaskFailure};

/// Results of one phase: its report plus the value of every successful task,
/// ordered by task index.
#[derive(Debug)]
pub struct PhaseOutcome<T> {
    pub report: PhaseReport,
    pub results: Vec<(usize, T)>,
}

/// Runs the tasks of one phase at a time, at most `size` of them concurrently.
///
/// Each call to [TaskPool::run_phase] is a barrier: it returns once every task
/// of the phase has finished. A failed or panicked task is recorded and never
/// cancels its siblings.
#[derive(Debug, Clone)]
pub struct TaskPool {
    size: usize,
    slots: Arc<Semaphore>,
}

impl TaskPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            slots: Arc::new(Semaphore::new(size)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub async fn run_phase<T, F, Fut>(
        &self,
        phase: Phase,
        tasks: usize,
        task: F,
    ) -> PhaseOutcome<T>
    where
        T: Send + 'static,
        F: Fn(usize) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = Instant::now();
        info!("Starting phase {phase} with {tasks} tasks on {} slots", self.size);

        let mut join_set = JoinSet::new();
        for index in 0..tasks {
            let slots = self.slots.clone();
            let fut = task(index);
            join_set.spawn(async move {
                // the semaphore is never closed
                let _permit = slots.acquire_owned().await;
                let result = match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(result) => result,
                    Err(panic) => Err(RangeSortError::Internal(format!(
                        "task panicked: {}",
                        any_to_string(&panic)
                    ))),
                };
                (index, result)
            });
        }

        let mut results = Vec::with_capacity(tasks);
        let mut failures = vec![];
        let mut lost = vec![];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Ok(value))) => results.push((index, value)),
                Ok((index, Err(e))) => {
                    error!("Task {index} of phase {phase} failed: {e}");
                    failures.push(TaskFailure::new(index, &e));
                }
                Err(e) => lost.push(RangeSortError::from(e)),
            }
        }
        if !lost.is_empty() {
            let mut finished: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
            finished.extend(failures.iter().map(|f| f.task));
            let missing = (0..tasks).filter(|i| !finished.contains(i));
            for (index, e) in missing.zip(lost) {
                error!("Task {index} of phase {phase} was lost: {e}");
                failures.push(TaskFailure::new(index, &e));
            }
        }
        results.sort_unstable_by_key(|(i, _)| *i);
        failures.sort_unstable_by_key(|f| f.task);

        let report = PhaseReport {
            phase,
            tasks,
            failures,
            elapsed: now.elapsed(),
        };
        info!("{report}");
        PhaseOutcome { report, results }
    }
}

/// Runs a phase consisting of one step on the calling task.
pub async fn run_inline<T, Fut>(phase: Phase, step: Fut) -> (PhaseReport, Result<T>)
where
    Fut: Future<Output = Result<T>>,
{
    let now = Instant::now();
    info!("Starting phase {phase}");
    let result = step.await;
    let failures = match &result {
        Ok(_) => vec![],
        Err(e) => {
            error!("Phase {phase} failed: {e}");
            vec![TaskFailure::new(0, e)]
        }
    };
    let report = PhaseReport {
        phase,
        tasks: 1,
        failures,
        elapsed: now.elapsed(),
    };
    info!("{report}");
    (report, result)
}

/// Tries to get meaningful description from panic-error.
fn any_to_string(any: &Box<dyn Any + Send>) -> String {
    if let Some(s) = any.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = any.downcast_ref::<String>() {
        s.clone()
    } else if let Some(error) = any.downcast_ref::<Box<dyn Error + Send>>() {
        error.to_string()
    } else {
        "Unknown error occurred".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_failures_do_not_cancel_siblings() {
        let pool = TaskPool::new(2);
        let outcome = pool
            .run_phase(Phase::Map, 5, |i| async move {
                if i == 3 {
                    Err(RangeSortError::General(format!("task {i}")))
                } else {
                    Ok(i * 10)
                }
            })
            .await;

        assert_eq!(outcome.results, vec![(0, 0), (1, 10), (2, 20), (4, 40)]);
        assert_eq!(outcome.report.tasks, 5);
        assert_eq!(outcome.report.failures.len(), 1);
        assert_eq!(outcome.report.failures[0].task, 3);
        assert_eq!(outcome.report.failures[0].message, "General error: task 3");
    }

    #[tokio::test]
    async fn test_panic_is_recorded() {
        let pool = TaskPool::new(1);
        let outcome = pool
            .run_phase(Phase::Reduce, 2, |i| async move {
                if i == 0 {
                    panic!("boom");
                }
                Ok(())
            })
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.report.failures[0].task, 0);
        assert!(outcome.report.failures[0].message.contains("boom"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = TaskPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let outcome = pool
            .run_phase(Phase::Generate, 12, |_| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(outcome.report.failures.is_empty());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_size_pool_still_runs() {
        let pool = TaskPool::new(0);
        assert_eq!(pool.size(), 1);
        let outcome = pool.run_phase(Phase::Map, 0, |_| async { Ok(()) }).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_run_inline() {
        let (report, result) = run_inline(Phase::Verify, async {
            Err::<(), _>(RangeSortError::General("bad".to_owned()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(report.failures.len(), 1);
    }
}
