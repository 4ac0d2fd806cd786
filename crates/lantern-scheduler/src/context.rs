//! Execution-time types handed to jobs when a trigger fires.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{JobDataMap, JobDefinition, JobScheduler, JobType, Trigger};

/// Everything a job knows about the firing it is executing.
#[derive(Clone)]
pub struct FiringContext {
    pub job: JobDefinition,
    pub trigger: Trigger,
    /// Job data overlaid with trigger data.
    pub merged_data: JobDataMap,
    pub fire_time: DateTime<Utc>,
    pub cancellation_token: CancellationToken,
    pub scheduler: Arc<dyn JobScheduler>,
}

impl FiringContext {
    pub fn new(
        job: JobDefinition,
        trigger: Trigger,
        fire_time: DateTime<Utc>,
        cancellation_token: CancellationToken,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        let merged_data = JobDataMap::merged(&job.data, &trigger.data);
        Self {
            job,
            trigger,
            merged_data,
            fire_time,
            cancellation_token,
            scheduler,
        }
    }
}

/// Executable logic bound to a [`JobType`].
///
/// `execute` is infallible: a job applies its own failure policy (reschedule
/// or remove) and never hands an error back to the scheduler.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn execute(&self, context: FiringContext);
}

/// Keeps track of which job logic runs for each job type.
#[derive(Default, Clone)]
pub struct JobRegistry {
    jobs: HashMap<JobType, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: JobType, job: Arc<dyn Job>) {
        self.jobs.insert(job_type, job);
    }

    pub fn with(mut self, job_type: JobType, job: Arc<dyn Job>) -> Self {
        self.register(job_type, job);
        self
    }

    pub fn get(&self, job_type: &JobType) -> Option<Arc<dyn Job>> {
        self.jobs.get(job_type).cloned()
    }

    /// Get a list of all registered job types.
    pub fn registered_job_types(&self) -> Vec<JobType> {
        self.jobs.keys().cloned().collect()
    }
}
