//! Adaptive execution-cost model.
//!
//! Keeps a bounded history of observed durations per task id and derives a
//! simple moving average from it. History is written through to a
//! [`KvStore`] after every observation and rehydrated on construction. When
//! the store misbehaves the model degrades to nominal-cost-only estimation
//! instead of failing the run.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nightshift_core::{KvStore, MemoryStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::task::TaskDescriptor;

/// Store key prefix for persisted cost records.
pub const COST_KEY_PREFIX: &str = "cost.";

fn cost_key(task_id: &str) -> String {
    format!("{COST_KEY_PREFIX}{task_id}")
}

/// Observed durations (seconds) for one task, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    samples: VecDeque<f64>,
    average: f64,
}

impl CostRecord {
    /// Append an observation, keeping at most `window` samples.
    pub fn observe(&mut self, seconds: f64, window: usize) {
        self.samples.push_back(seconds);
        while self.samples.len() > window {
            self.samples.pop_front();
        }
        self.average = mean(self.samples.iter());
    }

    pub fn samples(&self) -> &VecDeque<f64> {
        &self.samples
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    /// Mean of the newest `window` samples, if any. Matters when a task is
    /// re-registered with a smaller window than its stored history.
    fn recent_mean(&self, window: usize) -> Option<f64> {
        if window == 0 || self.samples.is_empty() {
            return None;
        }
        let skip = self.samples.len().saturating_sub(window);
        Some(mean(self.samples.iter().skip(skip)))
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Cost estimates frozen at ranking time for one run.
#[derive(Debug, Clone, Default)]
pub struct CostSnapshot {
    estimates: HashMap<String, f64>,
}

impl CostSnapshot {
    pub fn get(&self, task_id: &str) -> Option<f64> {
        self.estimates.get(task_id).copied()
    }

    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
}

/// Moving-average cost model backed by a key-value store.
pub struct CostModel {
    store: Arc<dyn KvStore>,
    records: RwLock<HashMap<String, CostRecord>>,
    /// Window per task id allowed to record. Ids missing here are ignored.
    windows: RwLock<HashMap<String, usize>>,
    degraded: AtomicBool,
}

impl CostModel {
    /// Create a model over `store`, loading any persisted history.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let model = Self {
            store,
            records: RwLock::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        };
        model.rehydrate();
        model
    }

    /// Model with a process-local store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn read_records(&self) -> RwLockReadGuard<'_, HashMap<String, CostRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, HashMap<String, CostRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    fn rehydrate(&self) {
        let entries = match self.store.scan_prefix(COST_KEY_PREFIX) {
            Ok(entries) => entries,
            Err(e) => {
                self.degrade("load", &e);
                return;
            }
        };

        let mut records = self.write_records();
        for (key, value) in entries {
            let Some(task_id) = key.strip_prefix(COST_KEY_PREFIX) else {
                continue;
            };
            match serde_json::from_str::<CostRecord>(&value) {
                Ok(record) => {
                    records.insert(task_id.to_string(), record);
                }
                Err(e) => warn!(task_id, error = %e, "skipping unreadable cost record"),
            }
        }
        if !records.is_empty() {
            info!("Rehydrated cost history for {} tasks", records.len());
        }
    }

    fn degrade(&self, op: &str, err: &StoreError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(op, error = %err, "cost store unavailable, falling back to nominal costs");
        }
    }

    /// Whether a store fault has disabled learning.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Replace the set of task ids allowed to record.
    pub fn replace_profiles(&self, tasks: &[TaskDescriptor]) {
        let mut windows = self.windows.write().unwrap_or_else(|e| e.into_inner());
        windows.clear();
        for task in tasks {
            windows.insert(task.id().to_string(), task.window());
        }
    }

    /// Allow `task` to record, keeping every other profile. An id that is
    /// already tracked keeps its window.
    pub fn track(&self, task: &TaskDescriptor) {
        self.windows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(task.id().to_string())
            .or_insert(task.window());
    }

    fn estimate_with(&self, records: &HashMap<String, CostRecord>, task: &TaskDescriptor) -> f64 {
        if self.is_degraded() {
            return task.nominal_cost();
        }
        records
            .get(task.id())
            .and_then(|r| r.recent_mean(task.window()))
            .unwrap_or_else(|| task.nominal_cost())
    }

    /// Current estimate in seconds: moving average when history exists,
    /// otherwise the declared nominal cost.
    pub fn estimate(&self, task: &TaskDescriptor) -> f64 {
        self.estimate_with(&self.read_records(), task)
    }

    /// Estimates for all `tasks` under a single read lock.
    pub fn snapshot(&self, tasks: &[TaskDescriptor]) -> CostSnapshot {
        let records = self.read_records();
        let estimates = tasks
            .iter()
            .map(|t| (t.id().to_string(), self.estimate_with(&records, t)))
            .collect();
        CostSnapshot { estimates }
    }

    /// Persisted history for `task_id`, if any.
    pub fn record_for(&self, task_id: &str) -> Option<CostRecord> {
        self.read_records().get(task_id).cloned()
    }

    /// Feed one observed duration into the history of `task_id`.
    pub fn record(&self, task_id: &str, observed_secs: f64) {
        if self.is_degraded() {
            return;
        }
        if !observed_secs.is_finite() || observed_secs < 0.0 {
            warn!(task_id, observed_secs, "ignoring invalid cost observation");
            return;
        }
        let window = {
            let windows = self.windows.read().unwrap_or_else(|e| e.into_inner());
            match windows.get(task_id) {
                Some(w) => *w,
                None => {
                    debug!(task_id, "ignoring observation for unregistered task");
                    return;
                }
            }
        };
        if window == 0 {
            return;
        }

        // Held across the store write so writers for one id never interleave.
        let mut records = self.write_records();
        let record = records.entry(task_id.to_string()).or_default();
        record.observe(observed_secs, window);
        debug!(task_id, observed_secs, average = record.average(), "recorded cost");

        let persisted = serde_json::to_string(record)
            .map_err(StoreError::from)
            .and_then(|json| self.store.set(&cost_key(task_id), &json));
        if let Err(e) = persisted {
            self.degrade("save", &e);
        }
    }

    /// Drop every record for every task id, in memory and in the store.
    /// Keys outside the cost prefix are left alone.
    pub fn reset(&self) {
        let mut records = self.write_records();
        records.clear();
        match self.store.clear_prefix(COST_KEY_PREFIX) {
            Ok(()) => {
                self.degraded.store(false, Ordering::Relaxed);
                info!("Cost history cleared");
            }
            Err(e) => self.degrade("clear", &e),
        }
    }
}
