//! Contract with the workflow runtime that jobs delegate to.

use std::sync::Arc;

use async_trait::async_trait;
use lantern_transient::Fault;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::tenant::Tenant;

/// Opaque locator of a suspended activity inside a workflow graph.
///
/// Produced by the runtime and handed back to it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityHandle(pub Value);

/// Errors reported by the workflow runtime.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// No workflow graph exists for the definition handle.
    #[error("workflow graph not found: {definition_handle}")]
    GraphNotFound { definition_handle: String },

    /// Any other failure, described for classification.
    #[error("{0}")]
    Fault(Fault),
}

impl From<Fault> for RuntimeError {
    fn from(fault: Fault) -> Self {
        RuntimeError::Fault(fault)
    }
}

/// Resume (or run) an existing workflow instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInstanceRequest {
    pub bookmark_id: Option<String>,
    pub activity_handle: Option<ActivityHandle>,
    pub input: Option<Map<String, Value>>,
    pub properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInstanceResponse {
    pub workflow_instance_id: String,
}

/// Start a new workflow instance from a definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    /// Definition version to instantiate.
    pub definition_handle: String,
    pub correlation_id: Option<String>,
    pub trigger_activity_id: Option<String>,
    pub input: Option<Map<String, Value>>,
    pub properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartWorkflowResponse {
    pub workflow_instance_id: Option<String>,
    /// The runtime declined to start the workflow (not an error).
    pub cannot_start: bool,
}

impl StartWorkflowResponse {
    pub fn started(workflow_instance_id: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: Some(workflow_instance_id.into()),
            cannot_start: false,
        }
    }

    pub fn cannot_start() -> Self {
        Self {
            workflow_instance_id: None,
            cannot_start: true,
        }
    }
}

/// Client bound to one workflow instance.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn run_instance(&self, request: RunInstanceRequest) -> Result<RunInstanceResponse, RuntimeError>;
}

/// Entry point into the workflow runtime.
///
/// The tenant is passed explicitly on every call rather than read from
/// ambient state.
#[async_trait]
pub trait WorkflowRuntime: Send + Sync {
    async fn create_client(
        &self,
        workflow_instance_id: &str,
        tenant: &Tenant,
    ) -> Result<Arc<dyn WorkflowClient>, RuntimeError>;

    async fn start_workflow(
        &self,
        request: StartWorkflowRequest,
        tenant: &Tenant,
    ) -> Result<StartWorkflowResponse, RuntimeError>;
}
