//! Turning a failed firing into a retry or an abandonment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lantern_scheduler::FiringContext;
use lantern_transient::DetectorChain;
use tracing::{error, warn};

use crate::retry::{RetryScheduler, cancellable};
use crate::{AbandonPolicy, JobError};

/// How one firing of a workflow job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The runtime call succeeded; the one-shot trigger retires normally.
    Succeeded,
    /// The runtime declined to start the workflow. Not an error.
    CannotStart,
    /// A transient failure; the same trigger fires again at `fire_at`.
    RetryScheduled { fire_at: DateTime<Utc> },
    /// A permanent failure; nothing will fire for this trigger again.
    Abandoned,
}

/// Shared failure policy of the workflow jobs.
#[derive(Clone)]
pub(crate) struct FailureHandler {
    detectors: DetectorChain,
    retry: Arc<dyn RetryScheduler>,
    abandon_policy: AbandonPolicy,
}

impl FailureHandler {
    pub(crate) fn new(
        detectors: DetectorChain,
        retry: Arc<dyn RetryScheduler>,
        abandon_policy: AbandonPolicy,
    ) -> Self {
        Self {
            detectors,
            retry,
            abandon_policy,
        }
    }

    /// Classify `error` and retry or abandon accordingly.
    pub(crate) async fn handle(&self, context: &FiringContext, error: JobError, instance: &str) -> JobOutcome {
        let fault = error.to_fault();
        if !self.detectors.is_transient(&fault) {
            return self.abandon(context, &error, instance).await;
        }

        match self.retry.schedule_retry(context).await {
            Ok(fire_at) => {
                warn!(
                    instance_id = %instance,
                    %fire_at,
                    error = %fault,
                    detector = self.detectors.matched_by(&fault).unwrap_or("unknown"),
                    "transient failure, retry scheduled"
                );
                JobOutcome::RetryScheduled { fire_at }
            }
            Err(retry_error) => {
                error!(
                    instance_id = %instance,
                    error = %fault,
                    retry_error = %retry_error,
                    "transient failure, but the retry could not be scheduled"
                );
                JobOutcome::Abandoned
            }
        }
    }

    /// Remove the failing work from the job store per the abandon policy.
    pub(crate) async fn abandon(&self, context: &FiringContext, error: &JobError, instance: &str) -> JobOutcome {
        error!(
            instance_id = %instance,
            job_key = %context.job.key,
            trigger_key = %context.trigger.key,
            policy = ?self.abandon_policy,
            error = %error,
            "permanent failure, abandoning job"
        );

        let scheduler = &context.scheduler;
        let removed = match self.abandon_policy {
            AbandonPolicy::DeleteJob => {
                cancellable(&context.cancellation_token, scheduler.delete_job(&context.job.key)).await
            }
            AbandonPolicy::UnscheduleTrigger => {
                cancellable(
                    &context.cancellation_token,
                    scheduler.unschedule_job(&context.trigger.key),
                )
                .await
            }
        };

        if let Err(e) = removed.and_then(|result| result.map_err(JobError::from)) {
            error!(instance_id = %instance, error = %e, "failed to remove abandoned job");
        }

        JobOutcome::Abandoned
    }
}
