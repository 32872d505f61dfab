//! Admission-controlled background task scheduler.
//!
//! Tasks are ranked by priority against a learned cost estimate, packed into
//! the host's time budget, and executed with bounded concurrency. Observed
//! durations feed a per-task moving average persisted in a [`KvStore`].
//!
//! [`KvStore`]: nightshift_core::KvStore

pub mod admission;
pub mod aggregate;
pub mod cost;
pub mod engine;
pub mod error;
pub mod host;
pub mod metrics;
pub mod runner;
pub mod score;
pub mod task;
pub mod types;

pub use admission::{admit, Admission};
pub use aggregate::aggregate;
pub use cost::{CostModel, CostRecord, CostSnapshot};
pub use engine::ExecutionEngine;
pub use error::{ConfigError, SchedulerError};
pub use host::{BackgroundHost, LoggingHost};
pub use metrics::SchedulerMetrics;
pub use runner::{Scheduler, SchedulerBuilder};
pub use score::{ScoreEngine, ScoredCandidate};
pub use task::{Completion, TaskDescriptor, TaskError, TaskUnit};
pub use types::{
    AggregateOutcome, Outcome, Priority, RunReport, SchedulerConfig, SchedulerState, TaskReport,
};
