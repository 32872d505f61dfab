use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str) -> Option<T> {
    profiled_env_opt(profile, key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub store: StoreConfig,
    pub scheduler: SchedulerEnv,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `NIGHTSHIFT_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("NIGHTSHIFT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            store: StoreConfig::from_env_profiled(p),
            scheduler: SchedulerEnv::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  store:      backend={}, state_file={}",
            self.store.backend,
            self.store.state_file.display()
        );
        tracing::info!(
            "  scheduler:  max_concurrency={}, task_timeout={}s, min_interval={}",
            self.scheduler.max_concurrency,
            self.scheduler.task_timeout_secs,
            self.scheduler
                .min_interval_secs
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "(host default)".to_string())
        );
    }

    /// Return a JSON view of the effective configuration.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "store": {
                "backend": self.store.backend,
                "state_file": self.store.state_file,
            },
            "scheduler": {
                "max_concurrency": self.scheduler.max_concurrency,
                "task_timeout_secs": self.scheduler.task_timeout_secs,
                "min_interval_secs": self.scheduler.min_interval_secs,
                "priority_exponent": self.scheduler.priority_exponent,
            },
        })
    }
}

// ── Store ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "file" or "memory"
    pub backend: String,
    pub state_file: PathBuf,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: profiled_env_or(p, "NIGHTSHIFT_STORE", "file").to_lowercase(),
            state_file: PathBuf::from(profiled_env_or(
                p,
                "NIGHTSHIFT_STATE_FILE",
                "data/nightshift-costs.json",
            )),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.backend != "memory"
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerEnv {
    /// Signed so a negative value can be reported instead of silently dropped.
    pub max_concurrency: i64,
    pub task_timeout_secs: u64,
    pub min_interval_secs: Option<u64>,
    pub priority_exponent: f64,
}

impl SchedulerEnv {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_concurrency: profiled_env_parse(p, "NIGHTSHIFT_MAX_CONCURRENCY").unwrap_or(0),
            task_timeout_secs: profiled_env_parse(p, "NIGHTSHIFT_TASK_TIMEOUT_SECS").unwrap_or(30),
            min_interval_secs: profiled_env_parse(p, "NIGHTSHIFT_MIN_INTERVAL_SECS"),
            priority_exponent: profiled_env_parse(p, "NIGHTSHIFT_PRIORITY_EXPONENT").unwrap_or(2.0),
        }
    }
}
