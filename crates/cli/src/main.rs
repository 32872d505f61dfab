mod cli;
mod command;
mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use nightshift_core::{Config, JsonFileStore, KvStore, MemoryStore};
use nightshift_scheduler::Scheduler;

use crate::cli::{CliArgs, Command};
use crate::config::CliConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    nightshift_core::config::load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let args = CliArgs::parse();
    let manifest = CliConfig::load(&args.manifest).context("failed to load task manifest")?;
    let scheduler_config = manifest.resolve_scheduler(&config.scheduler, args.max_concurrency)?;

    let store = open_store(&config, args.ephemeral);
    let scheduler = Scheduler::new(scheduler_config, store)?;

    match args.command {
        Command::Run { budget } => {
            scheduler.schedule_tasks(manifest.descriptors()?)?;
            let budget = Duration::try_from_secs_f64(budget).unwrap_or(Duration::ZERO);
            let report = scheduler.start(budget).await?;
            info!(
                aggregate = ?report.aggregate,
                executed = report.tasks.len(),
                skipped = report.skipped.len(),
                "Run finished"
            );
            print_json(&report)?;
        }
        Command::Now { task_id } => {
            let report = scheduler.schedule_now(manifest.descriptor(&task_id)?).await?;
            print_json(&report)?;
        }
        Command::Estimate => {
            scheduler.schedule_tasks(manifest.descriptors()?)?;
            let cost_model = scheduler.cost_model();
            let estimates: Vec<serde_json::Value> = scheduler
                .registered_tasks()
                .iter()
                .map(|task| {
                    let samples = cost_model
                        .record_for(task.id())
                        .map(|r| r.samples().len())
                        .unwrap_or(0);
                    serde_json::json!({
                        "id": task.id(),
                        "priority": task.priority(),
                        "nominal_cost": task.nominal_cost(),
                        "estimate": cost_model.estimate(task),
                        "samples": samples,
                        "window": task.window(),
                    })
                })
                .collect();
            print_json(&estimates)?;
        }
        Command::Reset => {
            scheduler.reset().await;
            print_json(&serde_json::json!({ "reset": true }))?;
        }
    }

    Ok(())
}

/// Open the configured cost store, falling back to memory if the state file
/// cannot be read.
fn open_store(config: &Config, ephemeral: bool) -> Arc<dyn KvStore> {
    if ephemeral || !config.store.is_persistent() {
        return Arc::new(MemoryStore::new());
    }
    match JsonFileStore::open(&config.store.state_file) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                path = %config.store.state_file.display(),
                error = %e,
                "Cost store unreadable, history will not be kept"
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
