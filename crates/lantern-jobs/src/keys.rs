//! Job keys and job data entry names shared by schedulers and jobs.

use lantern_scheduler::{JobKey, JobType};

/// Group every workflow job template is registered under.
pub const JOB_GROUP: &str = "lantern";

pub const RUN_WORKFLOW_JOB_TYPE: &str = "run-workflow";
pub const RESUME_WORKFLOW_JOB_TYPE: &str = "resume-workflow";

pub const WORKFLOW_INSTANCE_ID: &str = "WorkflowInstanceId";
pub const BOOKMARK_ID: &str = "BookmarkId";
pub const ACTIVITY_HANDLE: &str = "ActivityHandle";
pub const DEFINITION_VERSION_ID: &str = "DefinitionVersionId";
pub const CORRELATION_ID: &str = "CorrelationId";
pub const TRIGGER_ACTIVITY_ID: &str = "TriggerActivityId";
pub const INPUT: &str = "Input";
pub const PROPERTIES: &str = "Properties";
pub const TENANT_ID: &str = "TenantId";

/// The cluster-wide key of the template for `job_type`.
///
/// Every process derives the same key for the same type.
pub fn job_key_for(job_type: &JobType) -> JobKey {
    JobKey::new(job_type.as_str(), JOB_GROUP)
}

pub fn run_workflow_job_type() -> JobType {
    JobType::new(RUN_WORKFLOW_JOB_TYPE)
}

pub fn resume_workflow_job_type() -> JobType {
    JobType::new(RESUME_WORKFLOW_JOB_TYPE)
}

pub fn run_workflow_job_key() -> JobKey {
    job_key_for(&run_workflow_job_type())
}

pub fn resume_workflow_job_key() -> JobKey {
    job_key_for(&resume_workflow_job_type())
}
