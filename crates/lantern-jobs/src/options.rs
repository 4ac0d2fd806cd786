//! Scheduling options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to remove from the job store when a job fails permanently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// Delete the job by its key.
    ///
    /// Job keys are shared by every trigger of a job type, so this removes the
    /// template and every pending trigger of that type, not just the failing
    /// one.
    #[default]
    DeleteJob,
    /// Remove only the trigger that fired.
    UnscheduleTrigger,
}

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Options for workflow job scheduling, settable at process configuration time.
pub struct SchedulingOptions {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_transient_exception_retry_delay")]
    /// Delay before a trigger that failed transiently fires again.
    pub transient_exception_retry_delay: Duration,
    #[serde(default)]
    pub abandon_policy: AbandonPolicy,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            transient_exception_retry_delay: default_transient_exception_retry_delay(),
            abandon_policy: AbandonPolicy::default(),
        }
    }
}

impl SchedulingOptions {
    pub fn with_transient_exception_retry_delay(mut self, delay: Duration) -> Self {
        self.transient_exception_retry_delay = delay;
        self
    }

    pub fn with_abandon_policy(mut self, policy: AbandonPolicy) -> Self {
        self.abandon_policy = policy;
        self
    }
}

fn default_transient_exception_retry_delay() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_to_ten_seconds_and_delete_job() {
        let options = SchedulingOptions::default();
        assert_eq!(options.transient_exception_retry_delay, Duration::from_secs(10));
        assert_eq!(options.abandon_policy, AbandonPolicy::DeleteJob);
    }

    #[test]
    fn deserializes_partial_config() {
        let options: SchedulingOptions =
            serde_json::from_str(r#"{"transient_exception_retry_delay": 30}"#).unwrap();
        assert_eq!(
            options,
            SchedulingOptions::default().with_transient_exception_retry_delay(Duration::from_secs(30))
        );

        let options: SchedulingOptions =
            serde_json::from_str(r#"{"abandon_policy": "unschedule_trigger"}"#).unwrap();
        assert_eq!(options.abandon_policy, AbandonPolicy::UnscheduleTrigger);
        assert_eq!(options.transient_exception_retry_delay, Duration::from_secs(10));
    }
}
