//! Rescheduling of triggers that failed transiently.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use lantern_scheduler::{CancellationToken, Clock, FiringContext, SchedulerError, Trigger};
use tracing::debug;

use crate::{JobError, SchedulingOptions};

/// Await `future` unless `token` is cancelled first.
pub(crate) async fn cancellable<T>(
    token: &CancellationToken,
    future: impl Future<Output = T>,
) -> Result<T, JobError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        output = future => Ok(output),
    }
}

/// Books the next attempt of the trigger currently firing.
///
/// Implementations must not gate the reschedule on the firing's cancellation
/// token: a cancelled attempt is retried like any other transient failure.
/// The default implementation retries forever after a fixed delay. A policy
/// with an attempt ceiling or backoff curve is another implementation of this
/// trait.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Reschedule the firing trigger. Returns the new fire time.
    async fn schedule_retry(&self, context: &FiringContext) -> Result<DateTime<Utc>, JobError>;
}

/// Refires the same trigger a fixed delay after the decision was made.
pub struct DelayedRetryScheduler {
    delay: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl DelayedRetryScheduler {
    pub fn new(options: &SchedulingOptions, clock: Arc<dyn Clock>) -> Result<Self, JobError> {
        let delay = TimeDelta::from_std(options.transient_exception_retry_delay)
            .map_err(|e| JobError::Config(format!("retry delay out of range: {e}")))?;
        Ok(Self { delay, clock })
    }

    pub fn delay(&self) -> TimeDelta {
        self.delay
    }
}

#[async_trait]
impl RetryScheduler for DelayedRetryScheduler {
    #[tracing::instrument(skip_all, fields(trigger_key = %context.trigger.key))]
    async fn schedule_retry(&self, context: &FiringContext) -> Result<DateTime<Utc>, JobError> {
        let fire_at = self.clock.utc_now() + self.delay;

        // Same key and data, so the retry keeps the instance's context.
        let mut trigger = Trigger::once(context.trigger.key.clone(), context.job.key.clone(), fire_at)
            .with_data(context.trigger.data.clone());
        trigger.description = context.trigger.description.clone();

        let rescheduled = context
            .scheduler
            .reschedule_job(&context.trigger.key, trigger)
            .await?;

        match rescheduled {
            Some(next) => {
                debug!(fire_at = %next, "retry scheduled");
                Ok(next)
            }
            None => Err(SchedulerError::TriggerNotFound(context.trigger.key.clone()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use lantern_scheduler::{
        JobDataMap, JobDefinition, JobKey, JobScheduler, JobType, ManualClock, MemoryScheduler,
        MemorySchedulerConfig, TriggerKey,
    };

    async fn firing(now: DateTime<Utc>) -> (MemoryScheduler, FiringContext) {
        let clock = Arc::new(ManualClock::new(now));
        let scheduler = MemoryScheduler::new(clock, MemorySchedulerConfig::default());
        let job_key = JobKey::named("resume");
        scheduler
            .add_job(JobDefinition::durable(job_key.clone(), JobType::new("resume")), true)
            .await
            .unwrap();
        scheduler
            .schedule_job(
                Trigger::once(TriggerKey::named("t"), job_key, now)
                    .with_data(JobDataMap::new().with("WorkflowInstanceId", "wf-1")),
            )
            .await
            .unwrap();
        let context = scheduler.acquire_due().await.remove(0);
        (scheduler, context)
    }

    #[tokio::test]
    async fn fire_time_is_exactly_now_plus_delay() {
        let t0 = Utc::now();
        let (scheduler, context) = firing(t0).await;
        let options = SchedulingOptions::default().with_transient_exception_retry_delay(Duration::from_secs(42));
        let retry = DelayedRetryScheduler::new(&options, Arc::new(ManualClock::new(t0))).unwrap();

        let fire_at = retry.schedule_retry(&context).await.unwrap();

        assert_eq!(fire_at, t0 + TimeDelta::seconds(42));
        let trigger = scheduler.get_trigger(&context.trigger.key).await.unwrap().unwrap();
        assert_eq!(trigger.start_at, t0 + TimeDelta::seconds(42));
        assert_eq!(trigger.job_key, context.job.key);
        assert_eq!(trigger.data.get_str("WorkflowInstanceId"), Some("wf-1"));
    }

    #[tokio::test]
    async fn repeated_retries_use_the_same_delay() {
        let t0 = Utc::now();
        let (_scheduler, context) = firing(t0).await;
        let clock = ManualClock::new(t0);
        let retry = DelayedRetryScheduler::new(&SchedulingOptions::default(), Arc::new(clock.clone())).unwrap();

        let first = retry.schedule_retry(&context).await.unwrap();
        clock.advance(TimeDelta::seconds(10));
        let second = retry.schedule_retry(&context).await.unwrap();

        assert_eq!(first, t0 + TimeDelta::seconds(10));
        assert_eq!(second, t0 + TimeDelta::seconds(20));
    }

    #[tokio::test]
    async fn missing_trigger_is_an_error() {
        let t0 = Utc::now();
        let (scheduler, context) = firing(t0).await;
        scheduler.unschedule_job(&context.trigger.key).await.unwrap();
        let retry = DelayedRetryScheduler::new(&SchedulingOptions::default(), Arc::new(ManualClock::new(t0))).unwrap();

        let err = retry.schedule_retry(&context).await.unwrap_err();
        assert!(matches!(err, JobError::Scheduler(SchedulerError::TriggerNotFound(_))));
    }

    #[tokio::test]
    async fn cancelled_firing_still_books_its_retry() {
        let t0 = Utc::now();
        let (scheduler, context) = firing(t0).await;
        context.cancellation_token.cancel();
        let retry = DelayedRetryScheduler::new(&SchedulingOptions::default(), Arc::new(ManualClock::new(t0))).unwrap();

        let fire_at = retry.schedule_retry(&context).await.unwrap();

        assert_eq!(fire_at, t0 + TimeDelta::seconds(10));
        scheduler.complete(&context.trigger.key).await;
        assert!(scheduler.get_trigger(&context.trigger.key).await.unwrap().is_some());
    }
}
