use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use nightshift_core::{KvStore, MemoryStore};
use tracing::{debug, info, warn};

use crate::cost::CostModel;
use crate::engine::ExecutionEngine;
use crate::error::{ConfigError, SchedulerError};
use crate::host::{BackgroundHost, LoggingHost};
use crate::metrics::SchedulerMetrics;
use crate::task::TaskDescriptor;
use crate::types::{SchedulerConfig, SchedulerState};

/// Admission-controlled background task scheduler.
///
/// Construct once, register tasks while idle, then drive it with
/// [`start`](Scheduler::start) from the host's wake-up handler. Exactly one
/// budgeted run may be in flight; [`schedule_now`](Scheduler::schedule_now)
/// bypasses admission and may overlap it.
pub struct Scheduler {
    pub(super) config: RwLock<SchedulerConfig>,
    /// Registered tasks keyed by id.
    pub(super) registry: RwLock<BTreeMap<String, TaskDescriptor>>,
    pub(super) cost_model: Arc<CostModel>,
    pub(super) engine: ExecutionEngine,
    pub(super) host: Arc<dyn BackgroundHost>,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
    /// Held for the whole of a budgeted run and by `reset()`.
    pub(super) run_lock: tokio::sync::Mutex<()>,
    pub(super) running: AtomicBool,
    pub(super) stopped: AtomicBool,
}

/// Fluent builder for a [`Scheduler`].
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    store: Option<Arc<dyn KvStore>>,
    host: Option<Arc<dyn BackgroundHost>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            store: None,
            host: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Backing store for cost history (default: in-memory).
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Host background facility (default: logging only).
    pub fn host(mut self, host: Arc<dyn BackgroundHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Maximum concurrent tasks (0 = available parallelism).
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = limit;
        self
    }

    /// Per-task deadline, rounded up to whole seconds.
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        let partial = u64::from(timeout.subsec_nanos() > 0);
        self.config.task_timeout_secs = timeout.as_secs().saturating_add(partial);
        self
    }

    pub fn minimum_interval(mut self, interval: Duration) -> Self {
        self.config.min_interval_secs = Some(interval.as_secs());
        self
    }

    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        self.config.validate()?;

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let host = self.host.unwrap_or_else(|| Arc::new(LoggingHost));
        let cost_model = Arc::new(CostModel::new(store));
        let engine = ExecutionEngine::new(Arc::clone(&cost_model), self.config.task_timeout());

        if let Some(interval) = self.config.min_interval() {
            host.set_minimum_interval(Some(interval));
        }
        info!(
            "Scheduler created (max_concurrency: {}, task_timeout: {}s)",
            self.config.resolved_max_concurrency(),
            self.config.task_timeout_secs
        );

        Ok(Scheduler {
            config: RwLock::new(self.config),
            registry: RwLock::new(BTreeMap::new()),
            cost_model,
            engine,
            host,
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
            run_lock: tokio::sync::Mutex::new(()),
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Create a new scheduler with the given config and backing store.
    pub fn new(config: SchedulerConfig, store: Arc<dyn KvStore>) -> Result<Self, SchedulerError> {
        Self::builder().config(config).store(store).build()
    }

    /// Replace the full task registry. Only allowed while no run is active.
    ///
    /// Re-using an id replaces the earlier descriptor.
    pub fn schedule_tasks(&self, tasks: Vec<TaskDescriptor>) -> Result<(), SchedulerError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("schedule_tasks() refused: a run is in progress");
            return Err(SchedulerError::Busy);
        };
        if tasks.is_empty() {
            return Err(ConfigError::NoTasks.into());
        }
        for task in &tasks {
            task.validate()?;
        }

        let mut registry = BTreeMap::new();
        for task in tasks {
            info!(
                "Registered task: {} (priority: {:?}, cost: {}s, window: {})",
                task.id(),
                task.priority(),
                task.nominal_cost(),
                task.window()
            );
            if registry.insert(task.id().to_string(), task).is_some() {
                debug!("Duplicate task id replaced an earlier descriptor");
            }
        }

        let descriptors: Vec<TaskDescriptor> = registry.values().cloned().collect();
        self.cost_model.replace_profiles(&descriptors);
        *self.registry.write().unwrap_or_else(|e| e.into_inner()) = registry;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        if self.stopped.load(Ordering::Acquire) {
            SchedulerState::Stopped
        } else if self.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Registered tasks, ordered by id.
    pub fn registered_tasks(&self) -> Vec<TaskDescriptor> {
        self.registry
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Current cost estimate (seconds) for a registered task.
    pub fn estimate(&self, task_id: &str) -> Option<f64> {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        registry.get(task_id).map(|task| self.cost_model.estimate(task))
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Get an Arc to the metrics (for external reads without cloning).
    pub fn metrics_handle(&self) -> Arc<RwLock<SchedulerMetrics>> {
        Arc::clone(&self.metrics)
    }

    pub fn cost_model(&self) -> Arc<CostModel> {
        Arc::clone(&self.cost_model)
    }

    /// Copy of the active configuration.
    pub fn config(&self) -> SchedulerConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(super) fn with_metrics(&self, f: impl FnOnce(&mut SchedulerMetrics)) {
        f(&mut self.metrics.write().unwrap_or_else(|e| e.into_inner()));
    }
}
