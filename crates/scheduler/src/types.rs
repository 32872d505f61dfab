use std::time::Duration;

use chrono::{DateTime, Utc};
use nightshift_core::config::SchedulerEnv;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// Moving-average window used when a task does not declare one.
pub const DEFAULT_WINDOW: usize = 3;
/// Largest accepted moving-average window.
pub const MAX_WINDOW: usize = 30;

/// Static task priority. Higher numeric value = more important.
///
/// The ordinal feeds directly into the score, which is why the levels start
/// at 1 rather than 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    VeryLow = 1,
    Low = 2,
    Normal = 3,
    High = 4,
    VeryHigh = 5,
}

impl Priority {
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl TryFrom<i64> for Priority {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::VeryLow),
            2 => Ok(Priority::Low),
            3 => Ok(Priority::Normal),
            4 => Ok(Priority::High),
            5 => Ok(Priority::VeryHigh),
            other => Err(ConfigError::InvalidPriority(other)),
        }
    }
}

/// Completion signal of a single task unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NewData,
    NoData,
    Failed,
    /// The unit never signalled before its deadline.
    TimedOut,
}

impl Outcome {
    /// How this outcome participates in aggregation. A timeout counts as
    /// "no data", never as a failure.
    pub fn as_aggregate(self) -> AggregateOutcome {
        match self {
            Outcome::NewData => AggregateOutcome::NewData,
            Outcome::Failed => AggregateOutcome::Failed,
            Outcome::NoData | Outcome::TimedOut => AggregateOutcome::NoData,
        }
    }
}

/// Single verdict for a whole run, handed back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOutcome {
    NewData,
    NoData,
    Failed,
}

/// Lifecycle state of the scheduler facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Running,
    /// Future runs are refused until the host re-enables scheduling.
    Stopped,
}

/// Result of executing one task unit.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub task_id: String,
    pub outcome: Outcome,
    /// Wall-clock time from launch until the signal (or the deadline).
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Everything a budgeted run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub aggregate: AggregateOutcome,
    /// Reports for admitted tasks, in admission order.
    pub tasks: Vec<TaskReport>,
    /// Ranked candidates that did not fit the budget.
    pub skipped: Vec<String>,
    pub budget_secs: f64,
    /// Estimated makespan of the admitted set.
    pub planned_secs: f64,
}

impl RunReport {
    pub fn admitted_ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.task_id.as_str()).collect()
    }
}

/// Scheduler configuration, typically parsed from TOML or the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum tasks executing at once. 0 = available parallelism.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for a single task unit to signal completion.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Advisory minimum interval between runs, forwarded to the host.
    #[serde(default)]
    pub min_interval_secs: Option<u64>,
    /// Exponent applied to the priority ordinal when scoring.
    #[serde(default = "default_priority_exponent")]
    pub priority_exponent: f64,
}

fn default_max_concurrency() -> usize { 0 }
fn default_task_timeout() -> u64 { 30 }
fn default_priority_exponent() -> f64 { 2.0 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout(),
            min_interval_secs: None,
            priority_exponent: default_priority_exponent(),
        }
    }
}

impl SchedulerConfig {
    /// Resolve the concurrency limit (0 means use available parallelism).
    pub fn resolved_max_concurrency(&self) -> usize {
        if self.max_concurrency == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.max_concurrency
        }
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.priority_exponent.is_finite() || self.priority_exponent <= 0.0 {
            return Err(ConfigError::InvalidExponent(self.priority_exponent));
        }
        if self.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

impl TryFrom<&SchedulerEnv> for SchedulerConfig {
    type Error = ConfigError;

    fn try_from(env: &SchedulerEnv) -> Result<Self, Self::Error> {
        let max_concurrency = usize::try_from(env.max_concurrency)
            .map_err(|_| ConfigError::InvalidConcurrency(env.max_concurrency))?;
        let config = Self {
            max_concurrency,
            task_timeout_secs: env.task_timeout_secs,
            min_interval_secs: env.min_interval_secs,
            priority_exponent: env.priority_exponent,
        };
        config.validate()?;
        Ok(config)
    }
}
