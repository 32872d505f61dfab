use thiserror::Error;

/// Rejected configuration or task registration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no tasks to register")]
    NoTasks,
    #[error("task id must not be empty")]
    EmptyId,
    #[error("task {task_id}: window {window} exceeds the maximum of {max}")]
    InvalidWindow { task_id: String, window: usize, max: usize },
    #[error("task {task_id}: nominal cost {cost} must be finite and >= 0")]
    InvalidCost { task_id: String, cost: f64 },
    #[error("priority {0} is outside 1..=5")]
    InvalidPriority(i64),
    #[error("concurrency limit {0} must not be negative")]
    InvalidConcurrency(i64),
    #[error("priority exponent {0} must be finite and > 0")]
    InvalidExponent(f64),
    #[error("task timeout must be at least one second")]
    InvalidTimeout,
}

/// Misuse of the scheduler lifecycle.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a run is already in progress")]
    AlreadyRunning,
    #[error("scheduler is stopped")]
    Stopped,
    #[error("cannot reconfigure while a run is in progress")]
    Busy,
    #[error(transparent)]
    Config(#[from] ConfigError),
}
