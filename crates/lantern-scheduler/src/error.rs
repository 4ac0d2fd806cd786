//! Error types for the scheduler.

use thiserror::Error;

use crate::{JobKey, TriggerKey};

/// Errors that can occur in scheduler operations.
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    /// A job with this key is already stored.
    #[error("job already exists: {0}")]
    JobExists(JobKey),

    /// Job not found.
    #[error("job not found: {0}")]
    JobNotFound(JobKey),

    /// A trigger with this key is already stored.
    #[error("trigger already exists: {0}")]
    TriggerExists(TriggerKey),

    /// Trigger not found.
    #[error("trigger not found: {0}")]
    TriggerNotFound(TriggerKey),

    /// The backing store could not be reached.
    #[error("job store unavailable: {0}")]
    Unavailable(String),
}
