//! In-memory job store and firing loop.
//!
//! Job templates and triggers live in two separate repositories behind one
//! lock, so operations that touch both (deleting a job together with its
//! triggers) stay atomic. Fired triggers are dispatched onto their own tasks;
//! nothing serializes executions of the same job key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    Clock, FiringContext, JobDefinition, JobKey, JobRegistry, JobScheduler, MemorySchedulerConfig,
    SchedulerError, SystemClock, Trigger, TriggerKey,
};

/// Rarely written store of job templates.
#[derive(Default)]
struct JobTemplateStore {
    jobs: HashMap<JobKey, JobDefinition>,
}

impl JobTemplateStore {
    fn get(&self, key: &JobKey) -> Option<&JobDefinition> {
        self.jobs.get(key)
    }

    fn contains(&self, key: &JobKey) -> bool {
        self.jobs.contains_key(key)
    }

    fn insert(&mut self, job: JobDefinition) {
        self.jobs.insert(job.key.clone(), job);
    }

    fn remove(&mut self, key: &JobKey) -> Option<JobDefinition> {
        self.jobs.remove(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerState {
    Waiting,
    Executing,
}

struct StoredTrigger {
    trigger: Trigger,
    state: TriggerState,
}

/// High-churn store of per-instance triggers.
#[derive(Default)]
struct TriggerStore {
    triggers: HashMap<TriggerKey, StoredTrigger>,
}

impl TriggerStore {
    fn get(&self, key: &TriggerKey) -> Option<&StoredTrigger> {
        self.triggers.get(key)
    }

    fn contains(&self, key: &TriggerKey) -> bool {
        self.triggers.contains_key(key)
    }

    fn insert_waiting(&mut self, trigger: Trigger) {
        self.triggers.insert(
            trigger.key.clone(),
            StoredTrigger {
                trigger,
                state: TriggerState::Waiting,
            },
        );
    }

    fn remove(&mut self, key: &TriggerKey) -> Option<Trigger> {
        self.triggers.remove(key).map(|stored| stored.trigger)
    }

    fn remove_for_job(&mut self, job_key: &JobKey) -> usize {
        let before = self.triggers.len();
        self.triggers.retain(|_, stored| &stored.trigger.job_key != job_key);
        before - self.triggers.len()
    }

    fn has_triggers_for(&self, job_key: &JobKey) -> bool {
        self.triggers
            .values()
            .any(|stored| &stored.trigger.job_key == job_key)
    }

    /// Waiting triggers due at `now`, earliest first.
    fn due(&self, now: DateTime<Utc>) -> Vec<TriggerKey> {
        let mut due: Vec<_> = self
            .triggers
            .values()
            .filter(|stored| stored.state == TriggerState::Waiting && stored.trigger.is_due(now))
            .map(|stored| (stored.trigger.start_at, stored.trigger.key.clone()))
            .collect();
        due.sort();
        due.into_iter().map(|(_, key)| key).collect()
    }

    fn next_fire_time(&self) -> Option<DateTime<Utc>> {
        self.triggers
            .values()
            .filter(|stored| stored.state == TriggerState::Waiting)
            .map(|stored| stored.trigger.start_at)
            .min()
    }
}

#[derive(Default)]
struct State {
    jobs: JobTemplateStore,
    triggers: TriggerStore,
}

impl State {
    /// Drop a non-durable job once nothing references it.
    fn collect_orphan(&mut self, job_key: &JobKey) {
        let orphaned = self
            .jobs
            .get(job_key)
            .is_some_and(|job| !job.durable && !self.triggers.has_triggers_for(job_key));
        if orphaned {
            self.jobs.remove(job_key);
            debug!(job_key = %job_key, "removed non-durable job with no triggers");
        }
    }
}

/// A [`JobScheduler`] that keeps its store in process memory.
#[derive(Clone)]
pub struct MemoryScheduler {
    state: Arc<RwLock<State>>,
    clock: Arc<dyn Clock>,
    config: MemorySchedulerConfig,
    shutdown_token: CancellationToken,
    /// Signalled whenever a trigger is (re)scheduled, so the firing loop
    /// recomputes its sleep.
    wakeup: Arc<Notify>,
}

impl Default for MemoryScheduler {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), MemorySchedulerConfig::default())
    }
}

impl MemoryScheduler {
    /// Create a new scheduler.
    pub fn new(clock: Arc<dyn Clock>, config: MemorySchedulerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            clock,
            config,
            shutdown_token: CancellationToken::new(),
            wakeup: Arc::new(Notify::new()),
        }
    }

    /// List all job templates.
    pub async fn jobs(&self) -> Vec<JobDefinition> {
        self.state.read().await.jobs.jobs.values().cloned().collect()
    }

    /// List all triggers, waiting or executing.
    pub async fn triggers(&self) -> Vec<Trigger> {
        self.state
            .read()
            .await
            .triggers
            .triggers
            .values()
            .map(|stored| stored.trigger.clone())
            .collect()
    }

    /// Claim every trigger that is due now and build its firing context.
    ///
    /// Claimed triggers stay in the store as executing until
    /// [`complete`](Self::complete) retires them, so a job may still
    /// reschedule its own trigger while it runs.
    pub async fn acquire_due(&self) -> Vec<FiringContext> {
        let now = self.clock.utc_now();
        let mut state = self.state.write().await;
        let mut contexts = Vec::new();

        for key in state.triggers.due(now) {
            let Some(stored) = state.triggers.triggers.get_mut(&key) else {
                continue;
            };
            stored.state = TriggerState::Executing;
            let trigger = stored.trigger.clone();

            let job = state.jobs.get(&trigger.job_key).cloned();
            let Some(job) = job else {
                warn!(trigger_key = %key, job_key = %trigger.job_key, "trigger references missing job, discarding");
                state.triggers.remove(&key);
                continue;
            };

            contexts.push(FiringContext::new(
                job,
                trigger,
                now,
                self.shutdown_token.child_token(),
                Arc::new(self.clone()),
            ));
        }

        contexts
    }

    /// Retire a trigger after its job finished.
    ///
    /// A trigger the job rescheduled is waiting again and is left alone.
    pub async fn complete(&self, key: &TriggerKey) {
        let mut state = self.state.write().await;
        let executing = state
            .triggers
            .get(key)
            .is_some_and(|stored| stored.state == TriggerState::Executing);
        if !executing {
            return;
        }
        if let Some(trigger) = state.triggers.remove(key) {
            debug!(trigger_key = %key, "one-shot trigger completed");
            state.collect_orphan(&trigger.job_key);
        }
    }

    /// Run a fired trigger's job on its own task, then retire the trigger.
    pub fn dispatch(&self, context: FiringContext, registry: &JobRegistry) -> JoinHandle<()> {
        let job = registry
            .get(&context.job.job_type)
            .ok_or_else(|| registry.registered_job_types());
        let scheduler = self.clone();
        let trigger_key = context.trigger.key.clone();
        let span = info_span!(
            "job.fire",
            job_key = %context.job.key,
            job_type = %context.job.job_type,
            trigger_key = %trigger_key,
            fire_time = %context.fire_time,
        );

        tokio::spawn(
            async move {
                match job {
                    Ok(job) => job.execute(context).await,
                    Err(registered) => error!(?registered, "no job registered for job type"),
                }
                scheduler.complete(&trigger_key).await;
            }
            .instrument(span),
        )
    }

    /// Fire every due trigger and wait for all of them to finish.
    ///
    /// Returns the number of triggers fired.
    pub async fn run_due(&self, registry: &JobRegistry) -> usize {
        let handles: Vec<_> = self
            .acquire_due()
            .await
            .into_iter()
            .map(|context| self.dispatch(context, registry))
            .collect();
        let fired = handles.len();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "job task failed to complete");
            }
        }

        fired
    }

    /// Run the firing loop until `shutdown_rx` turns true.
    ///
    /// Jobs still running at shutdown see their cancellation token cancelled.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>, registry: Arc<JobRegistry>) {
        info!("scheduler starting");

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            for context in self.acquire_due().await {
                self.dispatch(context, &registry);
            }

            let sleep_duration = self.calculate_sleep_duration().await;

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = sleep(sleep_duration) => {}
                _ = self.wakeup.notified() => {
                    debug!("trigger scheduled, recomputing next fire time");
                }
            }
        }

        self.shutdown_token.cancel();
        info!("scheduler shut down gracefully");
    }

    /// Calculate how long to sleep until the next trigger is due.
    pub async fn calculate_sleep_duration(&self) -> std::time::Duration {
        let next_due = self.state.read().await.triggers.next_fire_time();
        let min = self.config.min_poll_interval;
        let max = self.config.max_poll_interval;

        match next_due {
            Some(next) => (next - self.clock.utc_now())
                .to_std()
                .unwrap_or(min)
                .clamp(min, max),
            None => max,
        }
    }
}

#[async_trait]
impl JobScheduler for MemoryScheduler {
    #[tracing::instrument(skip(self, job), fields(job_key = %job.key))]
    async fn add_job(&self, job: JobDefinition, fail_if_exists: bool) -> Result<(), SchedulerError> {
        let mut state = self.state.write().await;
        if fail_if_exists && state.jobs.contains(&job.key) {
            return Err(SchedulerError::JobExists(job.key));
        }
        state.jobs.insert(job);
        Ok(())
    }

    #[tracing::instrument(skip(self, trigger), fields(trigger_key = %trigger.key, job_key = %trigger.job_key))]
    async fn schedule_job(&self, trigger: Trigger) -> Result<DateTime<Utc>, SchedulerError> {
        let mut state = self.state.write().await;
        if !state.jobs.contains(&trigger.job_key) {
            return Err(SchedulerError::JobNotFound(trigger.job_key));
        }
        if state.triggers.contains(&trigger.key) {
            return Err(SchedulerError::TriggerExists(trigger.key));
        }
        let start_at = trigger.start_at;
        state.triggers.insert_waiting(trigger);
        self.wakeup.notify_one();
        debug!(%start_at, "scheduled trigger");
        Ok(start_at)
    }

    #[tracing::instrument(skip(self, trigger), fields(trigger_key = %key, start_at = %trigger.start_at))]
    async fn reschedule_job(
        &self,
        key: &TriggerKey,
        trigger: Trigger,
    ) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let mut state = self.state.write().await;
        if !state.triggers.contains(key) {
            return Ok(None);
        }
        if !state.jobs.contains(&trigger.job_key) {
            return Err(SchedulerError::JobNotFound(trigger.job_key));
        }
        if &trigger.key != key && state.triggers.contains(&trigger.key) {
            return Err(SchedulerError::TriggerExists(trigger.key));
        }
        let start_at = trigger.start_at;
        state.triggers.remove(key);
        state.triggers.insert_waiting(trigger);
        self.wakeup.notify_one();
        Ok(Some(start_at))
    }

    async fn unschedule_job(&self, key: &TriggerKey) -> Result<bool, SchedulerError> {
        let mut state = self.state.write().await;
        match state.triggers.remove(key) {
            Some(trigger) => {
                state.collect_orphan(&trigger.job_key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[tracing::instrument(skip(self), fields(job_key = %key))]
    async fn delete_job(&self, key: &JobKey) -> Result<bool, SchedulerError> {
        let mut state = self.state.write().await;
        let removed_triggers = state.triggers.remove_for_job(key);
        let existed = state.jobs.remove(key).is_some();
        if existed {
            info!(removed_triggers, "deleted job");
        }
        Ok(existed)
    }

    async fn check_exists(&self, key: &JobKey) -> Result<bool, SchedulerError> {
        Ok(self.state.read().await.jobs.contains(key))
    }

    async fn get_trigger(&self, key: &TriggerKey) -> Result<Option<Trigger>, SchedulerError> {
        Ok(self
            .state
            .read()
            .await
            .triggers
            .get(key)
            .map(|stored| stored.trigger.clone()))
    }
}
