//! Wiring of the workflow jobs from their collaborators.

use std::sync::Arc;

use lantern_scheduler::{Clock, JobRegistry, JobScheduler};
use lantern_transient::DetectorChain;

use crate::failure::FailureHandler;
use crate::keys::{resume_workflow_job_type, run_workflow_job_type};
use crate::registrar::JobRegistrar;
use crate::resume::ResumeWorkflowJob;
use crate::retry::{DelayedRetryScheduler, RetryScheduler};
use crate::run::RunWorkflowJob;
use crate::runtime::WorkflowRuntime;
use crate::tenant::TenantResolver;
use crate::{JobError, SchedulingOptions};

/// Builds the run-workflow and resume-workflow jobs and their registrar.
///
/// ```ignore
/// let jobs = WorkflowJobs::new(runtime, tenants, SchedulingOptions::default(), Arc::new(SystemClock));
/// jobs.registrar(scheduler.clone()).register_all(&token).await?;
/// scheduler.run(shutdown_rx, Arc::new(jobs.registry()?)).await;
/// ```
pub struct WorkflowJobs {
    runtime: Arc<dyn WorkflowRuntime>,
    tenants: Arc<dyn TenantResolver>,
    options: SchedulingOptions,
    clock: Arc<dyn Clock>,
    detectors: DetectorChain,
    retry: Option<Arc<dyn RetryScheduler>>,
}

impl WorkflowJobs {
    pub fn new(
        runtime: Arc<dyn WorkflowRuntime>,
        tenants: Arc<dyn TenantResolver>,
        options: SchedulingOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runtime,
            tenants,
            options,
            clock,
            detectors: DetectorChain::default_chain(),
            retry: None,
        }
    }

    /// Replace the default detector chain.
    pub fn with_detectors(mut self, detectors: DetectorChain) -> Self {
        self.detectors = detectors;
        self
    }

    /// Replace the fixed-delay retry policy.
    pub fn with_retry_scheduler(mut self, retry: Arc<dyn RetryScheduler>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn options(&self) -> &SchedulingOptions {
        &self.options
    }

    pub fn resume_job(&self) -> Result<ResumeWorkflowJob, JobError> {
        Ok(ResumeWorkflowJob::new(
            self.runtime.clone(),
            self.tenants.clone(),
            self.failure_handler()?,
        ))
    }

    pub fn run_job(&self) -> Result<RunWorkflowJob, JobError> {
        Ok(RunWorkflowJob::new(
            self.runtime.clone(),
            self.tenants.clone(),
            self.failure_handler()?,
        ))
    }

    /// Job logic for both workflow job types.
    pub fn registry(&self) -> Result<JobRegistry, JobError> {
        Ok(JobRegistry::new()
            .with(run_workflow_job_type(), Arc::new(self.run_job()?))
            .with(resume_workflow_job_type(), Arc::new(self.resume_job()?)))
    }

    pub fn registrar(&self, scheduler: Arc<dyn JobScheduler>) -> JobRegistrar {
        JobRegistrar::new(scheduler)
    }

    fn failure_handler(&self) -> Result<FailureHandler, JobError> {
        let retry = match &self.retry {
            Some(retry) => retry.clone(),
            None => Arc::new(DelayedRetryScheduler::new(&self.options, self.clock.clone())?),
        };
        Ok(FailureHandler::new(
            self.detectors.clone(),
            retry,
            self.options.abandon_policy,
        ))
    }
}
