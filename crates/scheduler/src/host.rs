use std::time::Duration;

use tracing::info;

/// The host's background-execution facility.
///
/// The scheduler only forwards the advisory minimum interval between runs;
/// `None` asks the host to stop waking the process.
pub trait BackgroundHost: Send + Sync {
    fn set_minimum_interval(&self, interval: Option<Duration>);
}

/// Host that only logs the requested interval.
#[derive(Debug, Default)]
pub struct LoggingHost;

impl BackgroundHost for LoggingHost {
    fn set_minimum_interval(&self, interval: Option<Duration>) {
        match interval {
            Some(interval) => info!("Host wake interval set to {:?}", interval),
            None => info!("Host wakeups disabled"),
        }
    }
}
