//! The run-workflow job.

use std::sync::Arc;

use async_trait::async_trait;
use lantern_scheduler::{FiringContext, Job, JobDataMap};
use tracing::{Span, info};

use crate::failure::{FailureHandler, JobOutcome};
use crate::keys::{CORRELATION_ID, DEFINITION_VERSION_ID, INPUT, PROPERTIES, TRIGGER_ACTIVITY_ID};
use crate::resume::json_object;
use crate::retry::cancellable;
use crate::runtime::{RuntimeError, StartWorkflowRequest, WorkflowRuntime};
use crate::tenant::{Tenant, TenantResolver};
use crate::JobError;

/// Starts a new workflow instance from a definition when its trigger fires.
pub struct RunWorkflowJob {
    runtime: Arc<dyn WorkflowRuntime>,
    tenants: Arc<dyn TenantResolver>,
    failures: FailureHandler,
}

impl RunWorkflowJob {
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
    ///
    /// A missing workflow graph is abandoned without consulting the
    /// transient detectors.
    #[tracing::instrument(
        name = "job.run_workflow",
        skip_all,
        fields(
            trigger_key = %context.trigger.key,
            definition_version_id = tracing::field::Empty,
            tenant_id = tracing::field::Empty,
        )
    )]
    pub async fn run(&self, context: &FiringContext) -> JobOutcome {
        let data = &context.merged_data;
        let definition = data.get_str(DEFINITION_VERSION_ID).unwrap_or_default().to_owned();
        Span::current().record("definition_version_id", definition.as_str());

        let tenant = match cancellable(&context.cancellation_token, self.tenants.find_tenant(data)).await {
            Ok(Ok(tenant)) => tenant,
            Ok(Err(fault)) => return self.failures.handle(context, JobError::Tenant(fault), &definition).await,
            Err(e) => return self.failures.handle(context, e, &definition).await,
        };
        Span::current().record("tenant_id", tenant.id_or_default());
        let _scope = self.tenants.push_context(&tenant);

        match self.start(context, &tenant).await {
            Ok(Some(instance)) => {
                info!(definition = %definition, instance_id = %instance, "workflow instance started");
                JobOutcome::Succeeded
            }
            Ok(None) => {
                info!(definition = %definition, "workflow cannot start, nothing to do");
                JobOutcome::CannotStart
            }
            Err(error @ JobError::Runtime(RuntimeError::GraphNotFound { .. })) => {
                self.failures.abandon(context, &error, &definition).await
            }
            Err(error) => self.failures.handle(context, error, &definition).await,
        }
    }

    /// Returns the new instance id, or `None` when the runtime declined.
    async fn start(&self, context: &FiringContext, tenant: &Tenant) -> Result<Option<String>, JobError> {
        let request = start_workflow_request(&context.merged_data)?;
        let response = cancellable(
            &context.cancellation_token,
            self.runtime.start_workflow(request, tenant),
        )
        .await??;

        if response.cannot_start {
            return Ok(None);
        }
        Ok(Some(response.workflow_instance_id.unwrap_or_default()))
    }
}

#[async_trait]
impl Job for RunWorkflowJob {
    async fn execute(&self, context: FiringContext) {
        self.run(&context).await;
    }
}

pub(crate) fn start_workflow_request(data: &JobDataMap) -> Result<StartWorkflowRequest, JobError> {
    let definition_handle = data
        .get_str(DEFINITION_VERSION_ID)
        .ok_or(JobError::MissingData(DEFINITION_VERSION_ID))?;

    Ok(StartWorkflowRequest {
        definition_handle: definition_handle.to_owned(),
        correlation_id: data.get_str(CORRELATION_ID).map(str::to_owned),
        trigger_activity_id: data.get_str(TRIGGER_ACTIVITY_ID).map(str::to_owned),
        input: json_object(data, INPUT)?,
        properties: json_object(data, PROPERTIES)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reads_start_request() {
        let data = JobDataMap::new()
            .with(DEFINITION_VERSION_ID, "def-7")
            .with(CORRELATION_ID, "order-42")
            .with(TRIGGER_ACTIVITY_ID, "")
            .with(INPUT, r#"{"orderId":42}"#);

        let request = start_workflow_request(&data).unwrap();

        assert_eq!(
            request,
            StartWorkflowRequest {
                definition_handle: "def-7".into(),
                correlation_id: Some("order-42".into()),
                trigger_activity_id: None,
                input: json!({"orderId": 42}).as_object().cloned(),
                properties: None,
            }
        );
    }

    #[test]
    fn definition_is_required() {
        let err = start_workflow_request(&JobDataMap::new()).unwrap_err();
        assert!(matches!(err, JobError::MissingData(DEFINITION_VERSION_ID)));
    }
}
