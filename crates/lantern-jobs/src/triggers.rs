//! Building and scheduling triggers for the workflow jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lantern_scheduler::{JobDataMap, JobScheduler, Trigger, TriggerKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::keys::{
    ACTIVITY_HANDLE, BOOKMARK_ID, CORRELATION_ID, DEFINITION_VERSION_ID, INPUT, JOB_GROUP, PROPERTIES,
    TENANT_ID, TRIGGER_ACTIVITY_ID, WORKFLOW_INSTANCE_ID, resume_workflow_job_key, run_workflow_job_key,
};
use crate::runtime::ActivityHandle;
use crate::JobError;

/// Resume `workflow_instance_id` at a bookmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeRequest {
    pub workflow_instance_id: String,
    pub bookmark_id: Option<String>,
    pub activity_handle: Option<ActivityHandle>,
    pub input: Option<Map<String, Value>>,
    pub properties: Option<Map<String, Value>>,
    pub tenant_id: Option<String>,
}

impl ResumeRequest {
    pub fn new(workflow_instance_id: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            ..Default::default()
        }
    }

    pub fn with_bookmark(mut self, bookmark_id: impl Into<String>) -> Self {
        self.bookmark_id = Some(bookmark_id.into());
        self
    }

    pub fn with_activity_handle(mut self, handle: ActivityHandle) -> Self {
        self.activity_handle = Some(handle);
        self
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Trigger data read back by the resume job.
    pub fn to_data(&self) -> JobDataMap {
        JobDataMap::new()
            .with(WORKFLOW_INSTANCE_ID, self.workflow_instance_id.as_str())
            .with_opt(BOOKMARK_ID, self.bookmark_id.as_deref())
            .with_opt(ACTIVITY_HANDLE, self.activity_handle.as_ref().map(|h| h.0.to_string()))
            .with_opt(INPUT, self.input.clone().map(Value::Object))
            .with_opt(PROPERTIES, self.properties.clone().map(Value::Object))
            .with_opt(TENANT_ID, self.tenant_id.as_deref())
    }
}

/// Start a new instance of a workflow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub definition_version_id: String,
    pub correlation_id: Option<String>,
    pub trigger_activity_id: Option<String>,
    pub input: Option<Map<String, Value>>,
    pub properties: Option<Map<String, Value>>,
    pub tenant_id: Option<String>,
}

impl RunRequest {
    pub fn new(definition_version_id: impl Into<String>) -> Self {
        Self {
            definition_version_id: definition_version_id.into(),
            ..Default::default()
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_trigger_activity(mut self, activity_id: impl Into<String>) -> Self {
        self.trigger_activity_id = Some(activity_id.into());
        self
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Trigger data read back by the run job.
    pub fn to_data(&self) -> JobDataMap {
        JobDataMap::new()
            .with(DEFINITION_VERSION_ID, self.definition_version_id.as_str())
            .with_opt(CORRELATION_ID, self.correlation_id.as_deref())
            .with_opt(TRIGGER_ACTIVITY_ID, self.trigger_activity_id.as_deref())
            .with_opt(INPUT, self.input.clone().map(Value::Object))
            .with_opt(PROPERTIES, self.properties.clone().map(Value::Object))
            .with_opt(TENANT_ID, self.tenant_id.as_deref())
    }
}

/// Schedules one-shot triggers against the shared workflow job templates.
///
/// Every trigger gets its own key, so any number of them can be pending for
/// the same job key at once.
#[derive(Clone)]
pub struct WorkflowTriggerFactory {
    scheduler: Arc<dyn JobScheduler>,
}

impl WorkflowTriggerFactory {
    pub fn new(scheduler: Arc<dyn JobScheduler>) -> Self {
        Self { scheduler }
    }

    pub fn resume_trigger(request: &ResumeRequest, at: DateTime<Utc>) -> Trigger {
        Trigger::once(new_trigger_key(), resume_workflow_job_key(), at)
            .with_data(request.to_data())
            .with_description(format!("resume {}", request.workflow_instance_id))
    }

    pub fn run_trigger(request: &RunRequest, at: DateTime<Utc>) -> Trigger {
        Trigger::once(new_trigger_key(), run_workflow_job_key(), at)
            .with_data(request.to_data())
            .with_description(format!("run {}", request.definition_version_id))
    }

    #[tracing::instrument(skip_all, fields(instance = %request.workflow_instance_id))]
    pub async fn schedule_resume(&self, request: &ResumeRequest, at: DateTime<Utc>) -> Result<TriggerKey, JobError> {
        self.schedule(Self::resume_trigger(request, at)).await
    }

    #[tracing::instrument(skip_all, fields(definition = %request.definition_version_id))]
    pub async fn schedule_run(&self, request: &RunRequest, at: DateTime<Utc>) -> Result<TriggerKey, JobError> {
        self.schedule(Self::run_trigger(request, at)).await
    }

    /// Remove a pending trigger. Returns whether it existed.
    pub async fn unschedule(&self, key: &TriggerKey) -> Result<bool, JobError> {
        Ok(self.scheduler.unschedule_job(key).await?)
    }

    async fn schedule(&self, trigger: Trigger) -> Result<TriggerKey, JobError> {
        let key = trigger.key.clone();
        let fire_at = self.scheduler.schedule_job(trigger).await?;
        info!(trigger_key = %key, %fire_at, "trigger scheduled");
        Ok(key)
    }
}

fn new_trigger_key() -> TriggerKey {
    TriggerKey::new(Uuid::new_v4().to_string(), JOB_GROUP)
}
