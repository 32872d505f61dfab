use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::info;

use super::Scheduler;

impl Scheduler {
    /// Refuse future runs and ask the host to stop waking the process.
    ///
    /// An in-flight run is not cancelled.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.host.set_minimum_interval(None);
        info!("Scheduler stopped");
    }

    /// Re-enable runs after [`stop`](Scheduler::stop), restoring the
    /// configured host interval.
    pub fn resume(&self) {
        if self.stopped.swap(false, Ordering::AcqRel) {
            self.host.set_minimum_interval(self.config().min_interval());
            info!("Scheduler resumed");
        }
    }

    /// Forward the advisory minimum interval between runs to the host. This
    /// also re-enables a stopped scheduler.
    pub fn set_minimum_interval(&self, interval: Duration) {
        self.config
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .min_interval_secs = Some(interval.as_secs());
        self.host.set_minimum_interval(Some(interval));
        if self.stopped.swap(false, Ordering::AcqRel) {
            info!("Scheduler re-enabled by host interval change");
        }
    }

    /// Change the concurrency limit for subsequent runs (0 = available
    /// parallelism).
    pub fn set_max_concurrency(&self, limit: usize) {
        self.config
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .max_concurrency = limit;
        info!("Max concurrency set to {}", limit);
    }

    /// Wait for any in-flight run, then forget all tasks and cost history.
    pub async fn reset(&self) {
        let _guard = self.run_lock.lock().await;

        self.registry
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.cost_model.reset();
        self.cost_model.replace_profiles(&[]);

        if self.stopped.swap(false, Ordering::AcqRel) {
            self.host.set_minimum_interval(self.config().min_interval());
        }
        info!("Scheduler reset");
    }
}
