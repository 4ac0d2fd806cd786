//! Job scheduler contract for Lantern.
//!
//! This crate provides:
//! - The [`JobScheduler`] trait: durable job templates plus one-shot triggers
//!   that fire at least once
//! - Keys, job data maps, and the [`FiringContext`] handed to a [`Job`]
//! - An injectable [`Clock`]
//! - [`MemoryScheduler`], an in-process store with a firing loop

mod clock;
mod config;
mod context;
mod error;
mod memory;
mod scheduler;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MemorySchedulerConfig;
pub use context::{FiringContext, Job, JobRegistry};
pub use error::SchedulerError;
pub use memory::MemoryScheduler;
pub use scheduler::JobScheduler;
pub use types::{DEFAULT_GROUP, JobDataMap, JobDefinition, JobKey, JobType, Trigger, TriggerKey};

pub use tokio_util::sync::CancellationToken;
