use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{AggregateOutcome, Outcome, RunReport, TaskReport};

/// Scheduler operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Budgeted runs that reached admission.
    pub runs_started: u64,
    /// `start()` calls refused (already running or stopped).
    pub runs_rejected: u64,
    /// Total executions by task id, budgeted and immediate alike.
    pub tasks_executed: HashMap<String, u64>,
    /// Ranked candidates left out of a run for lack of budget.
    pub tasks_skipped: u64,
    /// Outcome counts across all executions.
    pub outcomes: HashMap<Outcome, u64>,
    /// Most recent elapsed time by task id.
    pub last_elapsed: HashMap<String, Duration>,
    /// Start time of the most recent budgeted run.
    pub last_run: Option<DateTime<Utc>>,
    /// Aggregate verdict of the most recent budgeted run.
    pub last_aggregate: Option<AggregateOutcome>,
}

impl SchedulerMetrics {
    /// Record a single task execution.
    pub fn record_task(&mut self, report: &TaskReport) {
        *self.tasks_executed.entry(report.task_id.clone()).or_default() += 1;
        *self.outcomes.entry(report.outcome).or_default() += 1;
        self.last_elapsed
            .insert(report.task_id.clone(), report.elapsed);
    }

    /// Record a finished budgeted run and each of its tasks.
    pub fn record_run(&mut self, report: &RunReport) {
        self.runs_started += 1;
        self.tasks_skipped += report.skipped.len() as u64;
        self.last_run = Some(report.started_at);
        self.last_aggregate = Some(report.aggregate);
        for task in &report.tasks {
            self.record_task(task);
        }
    }

    pub fn record_rejection(&mut self) {
        self.runs_rejected += 1;
    }
}
