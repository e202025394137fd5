//! Batch scheduler honoring the dependency DAG, bounded concurrency, and
//! cancellation.
use super::graph::DependencyGraph;
use super::{BatchReport, Task, TaskResult, TaskState};
use crate::config::MAX_WORKER_CAP;
use crate::Result;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Executes a single task end-to-end.
///
/// The production implementation drives a backend process (see the runner
/// module); tests substitute stubs so scheduling behavior can be verified
/// without spawning anything.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one task to a terminal state. Implementations must honor the
    /// cancellation token by signalling their child process and must never
    /// panic on backend failures.
    async fn execute(&self, task: Task, cancel: CancellationToken) -> TaskResult;
}

/// Scheduler for a batch of interdependent tasks.
pub struct TaskScheduler {
    executor: Arc<dyn TaskExecutor>,
    max_workers: usize,
    fail_fast: bool,
}

impl TaskScheduler {
    /// Create a scheduler with the given worker-pool capacity.
    ///
    /// A capacity of 0 means unbounded, which is still capped internally at
    /// [`MAX_WORKER_CAP`] to protect the host.
    pub fn new(executor: Arc<dyn TaskExecutor>, max_workers: usize, fail_fast: bool) -> Self {
        Self {
            executor,
            max_workers,
            fail_fast,
        }
    }

    /// Effective worker-pool capacity after applying the internal cap.
    fn capacity(&self) -> usize {
        match self.max_workers {
            0 => MAX_WORKER_CAP,
            n => n.min(MAX_WORKER_CAP),
        }
    }

    /// Execute a batch and assemble its report.
    ///
    /// Dependency validation happens up front: duplicate ids, unknown
    /// dependency references, and cycles are rejected before any task
    /// starts. Results are reported in submission order.
    pub async fn run(&self, tasks: Vec<Task>, cancel: CancellationToken) -> Result<BatchReport> {
        let mut graph = DependencyGraph::build(&tasks)?;
        let total = tasks.len();
        debug!("scheduler: {} task(s), capacity {}", total, self.capacity());

        let semaphore = Arc::new(Semaphore::new(self.capacity()));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, TaskResult)>();

        let mut states: Vec<Option<TaskState>> = vec![None; total];
        let mut results: Vec<Option<TaskResult>> = (0..total).map(|_| None).collect();
        // DAG-ready tasks awaiting classification, then tasks cleared to run
        // but not yet admitted to the pool
        let mut pending_ready: VecDeque<usize> = graph.initially_ready().into();
        let mut runnable: VecDeque<usize> = VecDeque::new();
        let mut remaining = total;
        let mut externally_cancelled = false;
        // Once halted (fail-fast or external cancel), nothing new is
        // admitted; tasks already handed to workers run to completion.
        let mut halted = false;

        while remaining > 0 {
            // Classify DAG-ready tasks. Skips and pre-start cancellations
            // are terminal immediately and may unlock further ready tasks,
            // so this drains to a fixed point.
            while let Some(idx) = pending_ready.pop_front() {
                if results[idx].is_some() {
                    continue;
                }
                let id = graph.id_of(idx).to_string();

                let dependency_failed = graph
                    .dependencies_of(idx)
                    .iter()
                    .any(|&dep| states[dep] != Some(TaskState::Succeeded));
                let verdict = if dependency_failed {
                    debug!("scheduler: skipping {} (dependency-failed)", id);
                    Some(TaskResult::skipped(&id))
                } else if halted {
                    Some(TaskResult::cancelled(&id))
                } else {
                    None
                };
                match verdict {
                    Some(result) => {
                        states[idx] = Some(result.state);
                        results[idx] = Some(result);
                        remaining -= 1;
                        for ready in graph.complete(idx) {
                            pending_ready.push_back(ready);
                        }
                    }
                    None => runnable.push_back(idx),
                }
            }

            if halted {
                // not-yet-admitted tasks are cancelled, which may unlock
                // dependents for the next classification pass
                while let Some(idx) = runnable.pop_front() {
                    let result = TaskResult::cancelled(graph.id_of(idx));
                    states[idx] = Some(result.state);
                    results[idx] = Some(result);
                    remaining -= 1;
                    for ready in graph.complete(idx) {
                        pending_ready.push_back(ready);
                    }
                }
                if !pending_ready.is_empty() {
                    continue;
                }
            }

            // Admit runnable tasks while pool capacity remains. Admission
            // happens here, in the scheduler loop, so halting decisions are
            // serialized with dispatch.
            while !halted && !runnable.is_empty() {
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                    break;
                };
                let idx = runnable.pop_front().expect("queue checked non-empty");
                let task = tasks[idx].clone();
                let executor = Arc::clone(&self.executor);
                let cancel = cancel.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    let result = executor.execute(task, cancel).await;
                    let _ = tx.send((idx, result));
                });
            }

            if remaining == 0 {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled(), if !externally_cancelled => {
                    warn!("scheduler: external cancellation received");
                    externally_cancelled = true;
                    halted = true;
                    // in-flight workers observe the token themselves
                }
                received = rx.recv() => {
                    let (idx, result) = received.expect("completion channel closed");
                    debug!(
                        "scheduler: task {} finished with state {}",
                        result.task_id, result.state
                    );
                    if self.fail_fast
                        && !halted
                        && matches!(
                            result.state,
                            TaskState::Failed | TaskState::TimedOut | TaskState::Cancelled
                        )
                    {
                        warn!(
                            "scheduler: fail-fast triggered by task {}",
                            result.task_id
                        );
                        halted = true;
                    }
                    states[idx] = Some(result.state);
                    results[idx] = Some(result);
                    remaining -= 1;
                    for ready in graph.complete(idx) {
                        pending_ready.push_back(ready);
                    }
                }
            }
        }

        let ordered: Vec<TaskResult> = results
            .into_iter()
            .map(|r| r.expect("every task must have a result"))
            .collect();
        Ok(BatchReport::from_results(ordered, externally_cancelled))
    }
}
