use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::ConfigError;
use crate::types::{DEFAULT_WINDOW, MAX_WINDOW, Outcome, Priority};

/// Error type returned by a task unit. Any error counts as [`Outcome::Failed`]
/// unless the unit already signalled something else.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One-shot completion signal handed to every unit of work.
///
/// Consuming `self` makes a second signal impossible. Dropping it without
/// signalling is allowed and is reported as "no data".
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Outcome>,
}

impl Completion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn complete(self, outcome: Outcome) {
        // The receiver is gone once the deadline passed; nothing to report to.
        let _ = self.tx.send(outcome);
    }

    pub fn new_data(self) {
        self.complete(Outcome::NewData);
    }

    pub fn no_data(self) {
        self.complete(Outcome::NoData);
    }

    pub fn failed(self) {
        self.complete(Outcome::Failed);
    }
}

/// Task-supplied work. Each call to [`run`](TaskUnit::run) is one fresh unit
/// of work and must signal `completion` exactly once.
#[async_trait]
pub trait TaskUnit: Send + Sync {
    async fn run(&self, completion: Completion) -> Result<(), TaskError>;
}

struct FnUnit<F>(F);

#[async_trait]
impl<F, Fut> TaskUnit for FnUnit<F>
where
    F: Fn(Completion) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(&self, completion: Completion) -> Result<(), TaskError> {
        (self.0)(completion).await
    }
}

/// A registered background task: identity, cost profile and its unit factory.
#[derive(Clone)]
pub struct TaskDescriptor {
    id: String,
    priority: Priority,
    nominal_cost: f64,
    window: usize,
    unit: Arc<dyn TaskUnit>,
}

impl TaskDescriptor {
    /// `nominal_cost` is in seconds and is used until history exists.
    pub fn new(
        id: impl Into<String>,
        priority: Priority,
        nominal_cost: f64,
        unit: Arc<dyn TaskUnit>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            nominal_cost,
            window: DEFAULT_WINDOW,
            unit,
        }
    }

    /// Build a descriptor from an async closure.
    pub fn from_fn<F, Fut>(id: impl Into<String>, priority: Priority, nominal_cost: f64, f: F) -> Self
    where
        F: Fn(Completion) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(id, priority, nominal_cost, Arc::new(FnUnit(f)))
    }

    /// Override the moving-average window. 0 disables learning.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn nominal_cost(&self) -> f64 {
        self.nominal_cost
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub(crate) fn unit(&self) -> Arc<dyn TaskUnit> {
        Arc::clone(&self.unit)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if self.window > MAX_WINDOW {
            return Err(ConfigError::InvalidWindow {
                task_id: self.id.clone(),
                window: self.window,
                max: MAX_WINDOW,
            });
        }
        if !self.nominal_cost.is_finite() || self.nominal_cost < 0.0 {
            return Err(ConfigError::InvalidCost {
                task_id: self.id.clone(),
                cost: self.nominal_cost,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("nominal_cost", &self.nominal_cost)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: &str) -> TaskDescriptor {
        TaskDescriptor::from_fn(id, Priority::Normal, 1.0, |c: Completion| async move {
            c.no_data();
            Ok(())
        })
    }

    #[test]
    fn defaults_to_window_three() {
        assert_eq!(noop("sync").window(), DEFAULT_WINDOW);
    }

    #[test]
    fn validate_rejects_bad_descriptors() {
        assert!(matches!(noop("  ").validate(), Err(ConfigError::EmptyId)));
        assert!(matches!(
            noop("sync").with_window(31).validate(),
            Err(ConfigError::InvalidWindow { window: 31, .. })
        ));
        assert!(noop("sync").with_window(30).validate().is_ok());
        assert!(noop("sync").with_window(0).validate().is_ok());

        let negative = TaskDescriptor::from_fn("neg", Priority::Low, -1.0, |c: Completion| async move {
            c.no_data();
            Ok(())
        });
        assert!(matches!(negative.validate(), Err(ConfigError::InvalidCost { .. })));
    }

    #[tokio::test]
    async fn completion_delivers_once() {
        let (completion, rx) = Completion::channel();
        completion.new_data();
        assert_eq!(rx.await.unwrap(), Outcome::NewData);
    }

    #[tokio::test]
    async fn dropped_completion_closes_channel() {
        let (completion, rx) = Completion::channel();
        drop(completion);
        assert!(rx.await.is_err());
    }
}
