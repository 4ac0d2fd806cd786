//! The resume-workflow job.

use std::sync::Arc;

use async_trait::async_trait;
use lantern_scheduler::{FiringContext, Job, JobDataMap};
use serde_json::{Map, Value};
use tracing::{Span, info};

use crate::failure::{FailureHandler, JobOutcome};
use crate::keys::{ACTIVITY_HANDLE, BOOKMARK_ID, INPUT, PROPERTIES, WORKFLOW_INSTANCE_ID};
use crate::retry::cancellable;
use crate::runtime::{ActivityHandle, RunInstanceRequest, WorkflowRuntime};
use crate::tenant::{Tenant, TenantResolver};
use crate::JobError;

/// Resumes a suspended workflow instance at a bookmark when its trigger fires.
pub struct ResumeWorkflowJob {
    runtime: Arc<dyn WorkflowRuntime>,
    tenants: Arc<dyn TenantResolver>,
    failures: FailureHandler,
}

impl ResumeWorkflowJob {
    pub(crate) fn new(
        runtime: Arc<dyn WorkflowRuntime>,
        tenants: Arc<dyn TenantResolver>,
        failures: FailureHandler,
    ) -> Self {
        Self {
            runtime,
            tenants,
            failures,
        }
    }

    /// Execute one firing. Never fails: errors end in a retry or abandonment.
    #[tracing::instrument(
        name = "job.resume_workflow",
        skip_all,
        fields(
            trigger_key = %context.trigger.key,
            workflow_instance_id = tracing::field::Empty,
            tenant_id = tracing::field::Empty,
        )
    )]
    pub async fn run(&self, context: &FiringContext) -> JobOutcome {
        let data = &context.merged_data;
        let instance = data.get_str(WORKFLOW_INSTANCE_ID).unwrap_or_default().to_owned();
        Span::current().record("workflow_instance_id", instance.as_str());

        let tenant = match cancellable(&context.cancellation_token, self.tenants.find_tenant(data)).await {
            Ok(Ok(tenant)) => tenant,
            Ok(Err(fault)) => return self.failures.handle(context, JobError::Tenant(fault), &instance).await,
            Err(e) => return self.failures.handle(context, e, &instance).await,
        };
        Span::current().record("tenant_id", tenant.id_or_default());
        let _scope = self.tenants.push_context(&tenant);

        match self.resume(context, &instance, &tenant).await {
            Ok(()) => {
                info!(instance_id = %instance, "workflow instance resumed");
                JobOutcome::Succeeded
            }
            Err(error) => self.failures.handle(context, error, &instance).await,
        }
    }

    async fn resume(&self, context: &FiringContext, instance: &str, tenant: &Tenant) -> Result<(), JobError> {
        if instance.is_empty() {
            return Err(JobError::MissingData(WORKFLOW_INSTANCE_ID));
        }
        let request = run_instance_request(&context.merged_data)?;
        let token = &context.cancellation_token;

        let client = cancellable(token, self.runtime.create_client(instance, tenant)).await??;
        let response = cancellable(token, client.run_instance(request)).await??;

        info!(instance_id = %response.workflow_instance_id, "runtime accepted resume request");
        Ok(())
    }
}

#[async_trait]
impl Job for ResumeWorkflowJob {
    async fn execute(&self, context: FiringContext) {
        self.run(&context).await;
    }
}

/// Read the resume request out of a firing's merged data.
pub(crate) fn run_instance_request(data: &JobDataMap) -> Result<RunInstanceRequest, JobError> {
    Ok(RunInstanceRequest {
        bookmark_id: data.get_str(BOOKMARK_ID).map(str::to_owned),
        activity_handle: data
            .get_json::<ActivityHandle>(ACTIVITY_HANDLE)
            .map_err(|e| JobError::invalid_data(ACTIVITY_HANDLE, e))?,
        input: json_object(data, INPUT)?,
        properties: json_object(data, PROPERTIES)?,
    })
}

pub(crate) fn json_object(data: &JobDataMap, key: &'static str) -> Result<Option<Map<String, Value>>, JobError> {
    data.get_json(key).map_err(|e| JobError::invalid_data(key, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reads_full_request() {
        let data = JobDataMap::new()
            .with(WORKFLOW_INSTANCE_ID, "wf-1")
            .with(BOOKMARK_ID, "bm-1")
            .with(ACTIVITY_HANDLE, r#"{"activityId":"approve"}"#)
            .with(INPUT, r#"{"amount":3}"#)
            .with(PROPERTIES, json!({"source": "api"}));

        let request = run_instance_request(&data).unwrap();

        assert_eq!(
            request,
            RunInstanceRequest {
                bookmark_id: Some("bm-1".into()),
                activity_handle: Some(ActivityHandle(json!({"activityId": "approve"}))),
                input: json!({"amount": 3}).as_object().cloned(),
                properties: json!({"source": "api"}).as_object().cloned(),
            }
        );
    }

    #[test]
    fn optional_entries_may_be_absent() {
        let data = JobDataMap::new().with(WORKFLOW_INSTANCE_ID, "wf-1");
        assert_eq!(run_instance_request(&data).unwrap(), RunInstanceRequest::default());
    }

    #[test]
    fn malformed_input_is_invalid_data() {
        let data = JobDataMap::new().with(INPUT, "{not json");
        let err = run_instance_request(&data).unwrap_err();
        assert!(matches!(err, JobError::InvalidData { key: INPUT, .. }));
    }
}
