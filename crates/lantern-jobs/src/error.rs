//! Error types for workflow jobs.

use lantern_scheduler::SchedulerError;
use lantern_transient::{Fault, FaultKind};
use thiserror::Error;

use crate::runtime::RuntimeError;

/// Errors that can occur while scheduling or executing workflow jobs.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Job scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Workflow runtime error.
    #[error("workflow runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Tenant could not be resolved.
    #[error("tenant resolution failed: {0}")]
    Tenant(Fault),

    /// A required job data entry is missing.
    #[error("missing job data: {0}")]
    MissingData(&'static str),

    /// A job data entry could not be read.
    #[error("invalid job data '{key}': {reason}")]
    InvalidData { key: &'static str, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The firing was cancelled.
    #[error("operation was cancelled")]
    Cancelled,
}

impl JobError {
    /// Describe this error for transient classification.
    pub fn to_fault(&self) -> Fault {
        match self {
            JobError::Scheduler(SchedulerError::Unavailable(message)) => {
                Fault::new(FaultKind::Io, message.clone())
            }
            JobError::Scheduler(other) => Fault::new(FaultKind::InvalidOperation, other.to_string()),
            JobError::Runtime(RuntimeError::Fault(fault)) => fault.clone(),
            JobError::Runtime(not_found @ RuntimeError::GraphNotFound { .. }) => {
                Fault::new(FaultKind::NotFound, not_found.to_string())
            }
            JobError::Tenant(fault) => fault.clone(),
            JobError::MissingData(_) | JobError::InvalidData { .. } | JobError::Config(_) => {
                Fault::new(FaultKind::Argument, self.to_string())
            }
            JobError::Cancelled => Fault::cancelled(),
        }
    }

    pub(crate) fn invalid_data(key: &'static str, error: serde_json::Error) -> Self {
        JobError::InvalidData {
            key,
            reason: error.to_string(),
        }
    }
}
