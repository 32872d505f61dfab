use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use nightshift_scheduler::{Priority, SchedulerConfig, TaskDescriptor};

use crate::command::CommandTask;

/// Task manifest loaded from a TOML file.
///
/// ```toml
/// [scheduler]
/// max_concurrency = 2
///
/// [[task]]
/// id = "sync-mail"
/// priority = 4
/// cost = 2.5
/// command = "fetch-mail --quiet"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Scheduler settings; falls back to the environment when absent.
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,

    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskEntry>,
}

/// One `[[task]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub id: String,

    /// Priority level 1 (very low) to 5 (very high)
    #[serde(default = "default_priority")]
    pub priority: i64,

    /// Nominal cost in seconds, used until history exists
    pub cost: f64,

    /// Moving-average window; 0 disables learning
    #[serde(default)]
    pub window: Option<usize>,

    /// Shell command run via `sh -c`
    pub command: String,
}

fn default_priority() -> i64 {
    Priority::Normal.ordinal() as i64
}

impl TaskEntry {
    pub fn descriptor(&self) -> Result<TaskDescriptor> {
        let priority = Priority::try_from(self.priority)
            .with_context(|| format!("task '{}'", self.id))?;
        let unit = Arc::new(CommandTask::new(&self.command));
        let descriptor = TaskDescriptor::new(&self.id, priority, self.cost, unit);
        Ok(match self.window {
            Some(window) => descriptor.with_window(window),
            None => descriptor,
        })
    }
}

impl CliConfig {
    /// Load the manifest at `path`. A missing manifest is an error.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "Loading manifest");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build descriptors for every manifest task.
    pub fn descriptors(&self) -> Result<Vec<TaskDescriptor>> {
        self.tasks.iter().map(TaskEntry::descriptor).collect()
    }

    /// Descriptor for a single task id.
    pub fn descriptor(&self, task_id: &str) -> Result<TaskDescriptor> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .with_context(|| format!("no task '{}' in manifest", task_id))?
            .descriptor()
    }

    /// Resolve scheduler settings.
    /// Priority: cli_override > manifest > environment.
    pub fn resolve_scheduler(
        &self,
        env: &nightshift_core::config::SchedulerEnv,
        max_concurrency_override: Option<usize>,
    ) -> Result<SchedulerConfig> {
        let mut config = match &self.scheduler {
            Some(config) => config.clone(),
            None => SchedulerConfig::try_from(env).context("invalid scheduler environment")?,
        };
        if let Some(limit) = max_concurrency_override {
            config.max_concurrency = limit;
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshift_core::config::SchedulerEnv;

    const MANIFEST: &str = r#"
[[task]]
id = "sync-mail"
priority = 5
cost = 2.0
command = "echo mail"

[[task]]
id = "prune"
cost = 10.0
window = 5
command = "true"
"#;

    fn env() -> SchedulerEnv {
        SchedulerEnv {
            max_concurrency: 3,
            task_timeout_secs: 30,
            min_interval_secs: None,
            priority_exponent: 2.0,
        }
    }

    #[test]
    fn test_parse_manifest() {
        let config = CliConfig::parse(MANIFEST).unwrap();
        assert!(config.scheduler.is_none());
        assert_eq!(config.tasks.len(), 2);
        assert_eq!(config.tasks[1].priority, 3);
        assert_eq!(config.tasks[1].window, Some(5));
    }

    #[test]
    fn test_descriptors() {
        let config = CliConfig::parse(MANIFEST).unwrap();
        let descriptors = config.descriptors().unwrap();
        assert_eq!(descriptors[0].id(), "sync-mail");
        assert_eq!(descriptors[0].priority(), Priority::VeryHigh);
        assert_eq!(descriptors[0].window(), 3);
        assert_eq!(descriptors[1].window(), 5);
        assert_eq!(descriptors[1].nominal_cost(), 10.0);
    }

    #[test]
    fn test_unknown_task_id() {
        let config = CliConfig::parse(MANIFEST).unwrap();
        assert!(config.descriptor("prune").is_ok());
        assert!(config.descriptor("missing").is_err());
    }

    #[test]
    fn test_invalid_priority() {
        let config = CliConfig::parse(
            r#"
[[task]]
id = "x"
priority = 9
cost = 1.0
command = "true"
"#,
        )
        .unwrap();
        assert!(config.descriptors().is_err());
    }

    #[test]
    fn test_resolve_scheduler_from_env() {
        let config = CliConfig::parse(MANIFEST).unwrap();
        let resolved = config.resolve_scheduler(&env(), None).unwrap();
        assert_eq!(resolved.max_concurrency, 3);

        let overridden = config.resolve_scheduler(&env(), Some(1)).unwrap();
        assert_eq!(overridden.max_concurrency, 1);
    }

    #[test]
    fn test_manifest_scheduler_wins_over_env() {
        let config = CliConfig::parse("[scheduler]\nmax_concurrency = 8\ntask_timeout_secs = 5\n").unwrap();
        let resolved = config.resolve_scheduler(&env(), None).unwrap();
        assert_eq!(resolved.max_concurrency, 8);
        assert_eq!(resolved.task_timeout_secs, 5);
        assert_eq!(resolved.priority_exponent, 2.0);
    }

    #[test]
    fn test_negative_env_concurrency_rejected() {
        let config = CliConfig::default();
        let mut bad = env();
        bad.max_concurrency = -1;
        assert!(config.resolve_scheduler(&bad, None).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CliConfig::load(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nightshift.toml");
        std::fs::write(&path, MANIFEST).unwrap();
        assert_eq!(CliConfig::load(&path).unwrap().tasks.len(), 2);
    }
}
