//! The job scheduler contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{JobDefinition, JobKey, SchedulerError, Trigger, TriggerKey};

/// A durable, cluster-aware store of job templates and triggers that fires
/// triggers at least once.
///
/// Every mutating call is atomic with respect to other callers, including
/// callers in other processes sharing the same store.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Store a job template.
    ///
    /// With `fail_if_exists` set, an existing template with the same key yields
    /// [`SchedulerError::JobExists`]; otherwise the stored template is replaced.
    async fn add_job(&self, job: JobDefinition, fail_if_exists: bool) -> Result<(), SchedulerError>;

    /// Store a new trigger for an existing job. Returns the first fire time.
    async fn schedule_job(&self, trigger: Trigger) -> Result<DateTime<Utc>, SchedulerError>;

    /// Replace the trigger stored under `key` with `trigger`.
    ///
    /// Returns the new trigger's first fire time, or `None` if no trigger with
    /// `key` exists.
    async fn reschedule_job(
        &self,
        key: &TriggerKey,
        trigger: Trigger,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError>;

    /// Remove one trigger. Returns whether it existed.
    async fn unschedule_job(&self, key: &TriggerKey) -> Result<bool, SchedulerError>;

    /// Remove a job template and every trigger that references it.
    async fn delete_job(&self, key: &JobKey) -> Result<bool, SchedulerError>;

    async fn check_exists(&self, key: &JobKey) -> Result<bool, SchedulerError>;

    async fn get_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>, SchedulerError>;
}
