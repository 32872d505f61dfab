//! Scheduler facade -- owns the task registry and the run lifecycle.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, builder, registration, and accessor methods
//! - `execution`: budgeted runs and immediate execution
//! - `lifecycle`: stop/resume, host interval, concurrency, and reset

mod core;
mod execution;
mod lifecycle;

pub use self::core::{Scheduler, SchedulerBuilder};
