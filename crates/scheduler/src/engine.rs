//! Bounded-concurrency execution of admitted tasks.
//!
//! Every unit of work runs in its own tokio task so a panic or error stays
//! with that task. The engine waits until the unit's completion is signalled
//! or dropped, or the per-task deadline passes, and feeds the elapsed time
//! into the [`CostModel`]. A concurrency slot stays taken until the unit's
//! own future finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::cost::CostModel;
use crate::task::{Completion, TaskDescriptor, TaskError};
use crate::types::{Outcome, TaskReport};

/// How a unit settled before any deadline.
enum Settled {
    Signalled(Outcome),
    /// The completion was dropped unsignalled; the unit's exit decides.
    Exited(Result<Result<(), TaskError>, JoinError>),
}

/// Runs task units and reports their outcomes. Holds no per-run state, so
/// one engine serves any number of sequential or concurrent runs.
#[derive(Clone)]
pub struct ExecutionEngine {
    cost_model: Arc<CostModel>,
    task_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(cost_model: Arc<CostModel>, task_timeout: Duration) -> Self {
        Self {
            cost_model,
            task_timeout,
        }
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Execute `admitted` with at most `concurrency` units in flight.
    ///
    /// Units are launched in order; reports come back in the same order. A
    /// unit holds its slot until its own future finishes, even after it has
    /// signalled.
    pub async fn run(&self, admitted: Vec<TaskDescriptor>, concurrency: usize) -> Vec<TaskReport> {
        let ids: Vec<String> = admitted.iter().map(|t| t.id().to_string()).collect();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, task) in admitted.into_iter().enumerate() {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let engine = self.clone();
            join_set.spawn(async move { (index, engine.execute(task, Some(permit)).await) });
        }

        let mut slots: Vec<Option<TaskReport>> = ids.iter().map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "task supervisor aborted"),
            }
        }

        // A missing slot means the supervisor itself died; report it rather
        // than drop it.
        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, task_id)| {
                slot.unwrap_or(TaskReport {
                    task_id,
                    outcome: Outcome::Failed,
                    elapsed: Duration::ZERO,
                })
            })
            .collect()
    }

    /// Execute one task immediately, outside any concurrency bound.
    pub async fn run_one(&self, task: TaskDescriptor) -> TaskReport {
        self.execute(task, None).await
    }

    async fn execute(&self, task: TaskDescriptor, permit: Option<OwnedSemaphorePermit>) -> TaskReport {
        let task_id = task.id().to_string();
        debug!(task_id = %task_id, "launching task");

        let (completion, mut signal) = Completion::channel();
        let unit = task.unit();
        let started = Instant::now();
        let deadline = started + self.task_timeout;
        let mut work = tokio::spawn(async move {
            let result = unit.run(completion).await;
            drop(permit);
            result
        });

        let settle = async {
            tokio::select! {
                biased;
                received = &mut signal => match received {
                    Ok(outcome) => Settled::Signalled(outcome),
                    Err(_) => Settled::Exited((&mut work).await),
                },
                // The unit returned but may have handed its completion on;
                // keep waiting until it is used or dropped.
                joined = &mut work => match (&mut signal).await {
                    Ok(outcome) => Settled::Signalled(outcome),
                    Err(_) => Settled::Exited(joined),
                },
            }
        };
        let settled = tokio::time::timeout_at(deadline, settle).await;
        let elapsed = started.elapsed();
        let timed_out = settled.is_err();

        let outcome = match settled {
            Err(_) => {
                work.abort();
                warn!(task_id = %task_id, timeout_secs = self.task_timeout.as_secs_f64(), "task never signalled, treating as no data");
                Outcome::TimedOut
            }
            Ok(Settled::Signalled(outcome)) => outcome,
            Ok(Settled::Exited(Ok(Ok(())))) => {
                debug!(task_id = %task_id, "task finished without signalling");
                Outcome::NoData
            }
            Ok(Settled::Exited(Ok(Err(e)))) => {
                warn!(task_id = %task_id, error = %e, "task failed");
                Outcome::Failed
            }
            Ok(Settled::Exited(Err(e))) => {
                warn!(task_id = %task_id, error = %e, "task panicked");
                Outcome::Failed
            }
        };

        // A unit that signalled and kept working is still bounded by its
        // deadline.
        if !timed_out && !work.is_finished() {
            let lingering = task_id.clone();
            tokio::spawn(async move {
                if tokio::time::timeout_at(deadline, &mut work).await.is_err() {
                    work.abort();
                    debug!(task_id = %lingering, "aborted work still running past its deadline");
                }
            });
        }

        self.cost_model.record(&task_id, elapsed.as_secs_f64());
        debug!(
            task_id = %task_id,
            outcome = ?outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "task finished"
        );

        TaskReport {
            task_id,
            outcome,
            elapsed,
        }
    }
}
