//! Durable workflow jobs for Lantern.
//!
//! This crate provides:
//! - [`JobRegistrar`]: idempotent startup registration of the job templates
//! - [`ResumeWorkflowJob`] and [`RunWorkflowJob`]: delegate to the
//!   [`WorkflowRuntime`] and turn failures into retries or abandonment
//! - [`RetryScheduler`]: the fixed-delay retry policy seam
//! - [`WorkflowTriggerFactory`]: one-shot triggers for bookmarks and starts
//!
//! Failures are classified with the detectors of `lantern-transient`.
//! Transient ones refire the same trigger after
//! [`SchedulingOptions::transient_exception_retry_delay`]; anything else is
//! removed from the store per the [`AbandonPolicy`].

mod error;
mod failure;
pub mod keys;
mod options;
mod registrar;
mod resume;
mod retry;
mod run;
mod runtime;
mod service;
mod tenant;
mod triggers;

pub use error::JobError;
pub use failure::JobOutcome;
pub use options::{AbandonPolicy, SchedulingOptions};
pub use registrar::JobRegistrar;
pub use resume::ResumeWorkflowJob;
pub use retry::{DelayedRetryScheduler, RetryScheduler};
pub use run::RunWorkflowJob;
pub use runtime::{
    ActivityHandle, RunInstanceRequest, RunInstanceResponse, RuntimeError, StartWorkflowRequest,
    StartWorkflowResponse, WorkflowClient, WorkflowRuntime,
};
pub use service::WorkflowJobs;
pub use tenant::{DataMapTenantResolver, Tenant, TenantResolver, TenantScope};
pub use triggers::{ResumeRequest, RunRequest, WorkflowTriggerFactory};
