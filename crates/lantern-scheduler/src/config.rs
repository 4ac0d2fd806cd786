//! Configuration for the in-memory scheduler's firing loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Controls how often [`MemoryScheduler::run`](crate::MemoryScheduler::run)
/// looks for due triggers.
pub struct MemorySchedulerConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_min_poll_interval")]
    /// Shortest sleep between checks, even when a trigger is already due.
    pub min_poll_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_max_poll_interval")]
    /// Longest sleep between checks when nothing is due soon.
    pub max_poll_interval: Duration,
}

impl Default for MemorySchedulerConfig {
    fn default() -> Self {
        Self {
            min_poll_interval: default_min_poll_interval(),
            max_poll_interval: default_max_poll_interval(),
        }
    }
}

fn default_min_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_poll_interval() -> Duration {
    Duration::from_secs(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: MemorySchedulerConfig = serde_json::from_str(r#"{"max_poll_interval": 5}"#).unwrap();
        assert_eq!(config.min_poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_interval, Duration::from_secs(5));
    }
}
