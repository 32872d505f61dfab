use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::admission::admit;
use crate::aggregate::aggregate;
use crate::error::SchedulerError;
use crate::score::ScoreEngine;
use crate::task::TaskDescriptor;
use crate::types::{AggregateOutcome, RunReport, TaskReport};

use super::Scheduler;

/// Raises the running flag for as long as it lives, including when the run
/// future is dropped part way.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    /// Run one budgeted pass: rank, admit, execute and aggregate.
    ///
    /// `budget` is the wall-clock time the host grants. It only steers
    /// admission; tasks that overrun their estimate still report.
    pub async fn start(&self, budget: Duration) -> Result<RunReport, SchedulerError> {
        if self.stopped.load(Ordering::Acquire) {
            self.with_metrics(|m| m.record_rejection());
            warn!("start() refused: scheduler is stopped");
            return Err(SchedulerError::Stopped);
        }
        let Ok(_guard) = self.run_lock.try_lock() else {
            self.with_metrics(|m| m.record_rejection());
            warn!("start() refused: a run is already in progress");
            return Err(SchedulerError::AlreadyRunning);
        };
        let _running = RunningFlag::raise(&self.running);

        let report = self.execute_run(budget).await;
        self.with_metrics(|m| m.record_run(&report));
        Ok(report)
    }

    /// Like [`start`](Scheduler::start), but also hands the aggregate outcome
    /// to `completion`, exactly once. A refused start reports no data.
    pub async fn start_with_completion<F>(
        &self,
        budget: Duration,
        completion: F,
    ) -> Result<RunReport, SchedulerError>
    where
        F: FnOnce(AggregateOutcome) + Send,
    {
        let result = self.start(budget).await;
        let outcome = match &result {
            Ok(report) => report.aggregate,
            Err(_) => AggregateOutcome::NoData,
        };
        completion(outcome);
        result
    }

    /// Execute `task` right away, bypassing ranking and admission.
    ///
    /// May overlap a budgeted run. The elapsed time still feeds the cost
    /// model.
    pub async fn schedule_now(&self, task: TaskDescriptor) -> Result<TaskReport, SchedulerError> {
        task.validate()?;
        self.cost_model.track(&task);
        info!("Executing task immediately: {}", task.id());

        let report = self.engine.run_one(task).await;
        self.with_metrics(|m| m.record_task(&report));
        Ok(report)
    }

    async fn execute_run(&self, budget: Duration) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let config = self.config();
        let concurrency = config.resolved_max_concurrency();

        // Registry and costs are both frozen here; records made during this
        // run only affect later runs.
        let tasks = self.registered_tasks();
        let snapshot = self.cost_model.snapshot(&tasks);
        let ranked = ScoreEngine::new(config.priority_exponent).rank(&tasks, &snapshot);

        let budget_secs = budget.as_secs_f64();
        let admission = admit(ranked, budget_secs, concurrency);
        info!(
            run_id = %run_id,
            candidates = tasks.len(),
            admitted = admission.admitted.len(),
            skipped = admission.skipped.len(),
            budget_secs,
            planned_secs = admission.makespan,
            "admission complete"
        );
        for candidate in &admission.skipped {
            debug!(
                task_id = %candidate.task_id,
                cost = candidate.cost,
                score = candidate.score,
                "skipped: does not fit the remaining budget"
            );
        }

        let skipped = admission.skipped.iter().map(|c| c.task_id.clone()).collect();
        let admitted: Vec<TaskDescriptor> = admission.admitted.into_iter().map(|c| c.task).collect();
        let reports = if admitted.is_empty() {
            Vec::new()
        } else {
            self.engine.run(admitted, concurrency).await
        };

        let aggregate = aggregate(reports.iter().map(|r| &r.outcome));
        info!(run_id = %run_id, aggregate = ?aggregate, tasks = reports.len(), "run complete");

        RunReport {
            run_id,
            started_at,
            aggregate,
            tasks: reports,
            skipped,
            budget_secs,
            planned_secs: admission.makespan,
        }
    }
}
