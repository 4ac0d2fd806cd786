//! Startup registration of durable job templates.

use std::sync::Arc;

use lantern_scheduler::{CancellationToken, JobDefinition, JobScheduler, JobType, SchedulerError};
use tracing::{debug, info};

use crate::keys::{job_key_for, resume_workflow_job_type, run_workflow_job_type};
use crate::retry::cancellable;
use crate::JobError;

/// Ensures exactly one durable template per job type exists in the shared
/// store, no matter how many processes register at the same time.
pub struct JobRegistrar {
    scheduler: Arc<dyn JobScheduler>,
    job_types: Vec<(JobType, &'static str)>,
}

impl JobRegistrar {
    /// A registrar for the run-workflow and resume-workflow jobs.
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self {
            scheduler,
            job_types: vec![
                (run_workflow_job_type(), "Starts a new workflow instance"),
                (resume_workflow_job_type(), "Resumes a suspended workflow instance"),
            ],
        }
    }

    /// Register an additional job type.
    pub fn with_job_type(mut self, job_type: JobType, description: &'static str) -> Self {
        self.job_types.push((job_type, description));
        self
    }

    pub fn job_types(&self) -> impl Iterator<Item = &JobType> {
        self.job_types.iter().map(|(job_type, _)| job_type)
    }

    /// Register every known job type. Called once at process startup.
    ///
    /// A template that already exists counts as registered; any other error
    /// aborts registration.
    #[tracing::instrument(skip_all)]
    pub async fn register_all(&self, cancellation_token: &CancellationToken) -> Result<(), JobError> {
        for (job_type, description) in &self.job_types {
            let definition =
                JobDefinition::durable(job_key_for(job_type), job_type.clone()).with_description(*description);
            self.register(definition, cancellation_token).await?;
        }
        Ok(())
    }

    /// Add one template, treating "already exists" as success.
    pub async fn register(
        &self,
        definition: JobDefinition,
        cancellation_token: &CancellationToken,
    ) -> Result<(), JobError> {
        let key = definition.key.clone();
        match cancellable(cancellation_token, self.scheduler.add_job(definition, true)).await? {
            Ok(()) => {
                info!(job_key = %key, "registered job");
                Ok(())
            }
            Err(SchedulerError::JobExists(_)) => {
                debug!(job_key = %key, "job already registered");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use lantern_scheduler::{JobKey, MemoryScheduler, Trigger, TriggerKey};

    use crate::keys::{resume_workflow_job_key, run_workflow_job_key};

    #[tokio::test]
    async fn registers_both_workflow_jobs() {
        let scheduler = MemoryScheduler::default();
        JobRegistrar::new(Arc::new(scheduler.clone()))
            .register_all(&CancellationToken::new())
            .await
            .unwrap();

        assert!(scheduler.check_exists(&run_workflow_job_key()).await.unwrap());
        assert!(scheduler.check_exists(&resume_workflow_job_key()).await.unwrap());
        assert!(scheduler.jobs().await.iter().all(|job| job.durable));
    }

    #[tokio::test]
    async fn registering_twice_is_a_no_op() {
        let scheduler = MemoryScheduler::default();
        let registrar = JobRegistrar::new(Arc::new(scheduler.clone()));
        let token = CancellationToken::new();

        registrar.register_all(&token).await.unwrap();
        registrar.register_all(&token).await.unwrap();

        assert_eq!(scheduler.jobs().await.len(), 2);
    }

    #[tokio::test]
    async fn extra_job_types_are_registered() {
        let scheduler = MemoryScheduler::default();
        JobRegistrar::new(Arc::new(scheduler.clone()))
            .with_job_type(JobType::new("purge"), "Purges old instances")
            .register_all(&CancellationToken::new())
            .await
            .unwrap();

        assert!(
            scheduler
                .check_exists(&JobKey::new("purge", "lantern"))
                .await
                .unwrap()
        );
    }

    /// Store that fails every write.
    struct UnavailableStore;

    #[async_trait]
    impl JobScheduler for UnavailableStore {
        async fn add_job(&self, _job: JobDefinition, _fail_if_exists: bool) -> Result<(), SchedulerError> {
            Err(SchedulerError::Unavailable("connection refused".into()))
        }
        async fn schedule_job(&self, _trigger: Trigger) -> Result<DateTime<Utc>, SchedulerError> {
            unimplemented!()
        }
        async fn reschedule_job(
            &self,
            _key: &TriggerKey,
            _trigger: Trigger,
        ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
            unimplemented!()
        }
        async fn unschedule_job(&self, _key: &TriggerKey) -> Result<bool, SchedulerError> {
            unimplemented!()
        }
        async fn delete_job(&self, _key: &JobKey) -> Result<bool, SchedulerError> {
            unimplemented!()
        }
        async fn check_exists(&self, _key: &JobKey) -> Result<bool, SchedulerError> {
            unimplemented!()
        }
        async fn get_trigger(&self, _key: &TriggerKey) -> Result<Option<Trigger>, SchedulerError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn other_store_errors_are_not_swallowed() {
        let err = JobRegistrar::new(Arc::new(UnavailableStore))
            .register_all(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Scheduler(SchedulerError::Unavailable(_))));
    }
}
