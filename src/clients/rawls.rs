//! Rawls: Terra workspaces, method configurations, and workflow submissions.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{segment, ApiError, RestClient};
use crate::poll::{JobPhase, JobStatus};

// ---------------------------------------------------------------------------
// Method configurations
// ---------------------------------------------------------------------------

/// Where a method configuration's workflow comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRepoMethod {
    pub source_repo: String,
    pub method_path: String,
    pub method_version: String,
}

/// Request body for importing a method configuration into a workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfigImport {
    pub namespace: String,
    pub name: String,
    pub root_entity_type: String,
    pub inputs: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub prerequisites: BTreeMap<String, String>,
    pub method_repo_method: MethodRepoMethod,
    pub method_config_version: u32,
    pub deleted: bool,
}

impl MethodConfigImport {
    /// A Dockstore-hosted workflow with no inputs or outputs bound.
    pub fn dockstore(namespace: &str, name: &str, method_path: &str, method_version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            root_entity_type: String::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            prerequisites: BTreeMap::new(),
            method_repo_method: MethodRepoMethod {
                source_repo: "dockstore".to_string(),
                method_path: method_path.to_string(),
                method_version: method_version.to_string(),
            },
            method_config_version: 1,
            deleted: false,
        }
    }
}

/// A method configuration as Rawls reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodConfigSummary {
    pub namespace: String,
    pub name: String,
    pub method_repo_method: MethodRepoMethod,
}

/// Response to a method configuration import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedMethodConfig {
    pub method_configuration: MethodConfigSummary,
}

// ---------------------------------------------------------------------------
// Workspaces
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRequest {
    pub namespace: String,
    pub name: String,
    pub authorization_domain: Vec<Value>,
    pub attributes: BTreeMap<String, String>,
    pub copy_files_with_prefix: String,
}

impl WorkspaceRequest {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            authorization_domain: Vec::new(),
            attributes: BTreeMap::from([("description".to_string(), String::new())]),
            copy_files_with_prefix: "notebooks/".to_string(),
        }
    }
}

/// Workspace details returned on creation. `workspace_id` is optional so its
/// absence can be asserted on rather than failing the decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDetails {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    pub created_by: String,
}

/// Result of a workspace deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// 2xx; Rawls currently answers 202 and deletes asynchronously.
    Accepted(StatusCode),
    /// The workspace does not exist (or no longer exists).
    NotFound,
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub method_configuration_namespace: String,
    pub method_configuration_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    pub expression: String,
    pub use_call_cache: bool,
    pub delete_intermediate_output_files: bool,
    pub workflow_failure_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputResolution {
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub status: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub input_resolutions: Vec<InputResolution>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Submission as returned by both the submit and the status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub submission_id: String,
    pub status: String,
    #[serde(default)]
    pub workflows: Vec<WorkflowReport>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SubmissionReport {
    pub fn first_workflow_status(&self) -> Option<&str> {
        self.workflows.first().map(|w| w.status.as_str())
    }
}

impl JobStatus for SubmissionReport {
    fn phase(&self) -> JobPhase {
        if self.first_workflow_status() == Some("Failed") {
            JobPhase::Failed
        } else if self.status == "Done" {
            JobPhase::Succeeded
        } else {
            JobPhase::Pending
        }
    }

    fn state(&self) -> String {
        self.first_workflow_status().unwrap_or(&self.status).to_string()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct RawlsClient {
    rest: RestClient,
}

impl RawlsClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    fn workspace_path(namespace: &str, workspace: &str) -> String {
        format!("/api/workspaces/{}/{}", segment(namespace), segment(workspace))
    }

    pub async fn create_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WorkspaceDetails, ApiError> {
        self.rest
            .post_json("/api/workspaces", &WorkspaceRequest::new(namespace, name))
            .await
    }

    /// Delete a workspace. A missing workspace is reported, not raised.
    pub async fn delete_workspace(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<DeleteOutcome, ApiError> {
        let path = Self::workspace_path(namespace, name);
        let (status, body) = self.rest.delete(&path).await?;
        if status.is_success() {
            Ok(DeleteOutcome::Accepted(status))
        } else if status == StatusCode::NOT_FOUND {
            Ok(DeleteOutcome::NotFound)
        } else {
            Err(ApiError::Status {
                endpoint: format!("DELETE {path}"),
                status,
                body,
            })
        }
    }

    pub async fn import_method_config(
        &self,
        namespace: &str,
        workspace: &str,
        config: &MethodConfigImport,
    ) -> Result<ImportedMethodConfig, ApiError> {
        let path = format!("{}/methodconfigs", Self::workspace_path(namespace, workspace));
        self.rest.post_json(&path, config).await
    }

    pub async fn list_method_configs(
        &self,
        namespace: &str,
        workspace: &str,
    ) -> Result<Vec<MethodConfigSummary>, ApiError> {
        let path = format!(
            "{}/methodconfigs?allRepos=true",
            Self::workspace_path(namespace, workspace)
        );
        self.rest.get_json(&path).await
    }

    pub async fn delete_method_config(
        &self,
        namespace: &str,
        workspace: &str,
        config_namespace: &str,
        config_name: &str,
    ) -> Result<(), ApiError> {
        let path = format!(
            "{}/methodconfigs/{}/{}",
            Self::workspace_path(namespace, workspace),
            segment(config_namespace),
            segment(config_name)
        );
        let (status, body) = self.rest.delete(&path).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                endpoint: format!("DELETE {path}"),
                status,
                body,
            })
        }
    }

    pub async fn submit_workflow(
        &self,
        namespace: &str,
        workspace: &str,
        request: &SubmissionRequest,
    ) -> Result<SubmissionReport, ApiError> {
        let path = format!("{}/submissions", Self::workspace_path(namespace, workspace));
        self.rest.post_json(&path, request).await
    }

    pub async fn submission_status(
        &self,
        namespace: &str,
        workspace: &str,
        submission_id: &str,
    ) -> Result<SubmissionReport, ApiError> {
        let path = format!(
            "{}/submissions/{}",
            Self::workspace_path(namespace, workspace),
            segment(submission_id)
        );
        self.rest.get_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub;
    use axum::extract::Path;
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn report(status: &str, workflow: &str) -> SubmissionReport {
        serde_json::from_value(json!({
            "submissionId": "s-1",
            "status": status,
            "workflows": [{ "status": workflow }]
        }))
        .unwrap()
    }

    #[test]
    fn test_submission_phase() {
        assert_eq!(report("Submitted", "Queued").phase(), JobPhase::Pending);
        assert_eq!(report("Running", "Running").phase(), JobPhase::Pending);
        assert_eq!(report("Running", "Failed").phase(), JobPhase::Failed);
        assert_eq!(report("Done", "Succeeded").phase(), JobPhase::Succeeded);
        assert_eq!(report("Done", "Failed").phase(), JobPhase::Failed);
        assert_eq!(report("Running", "Running").state(), "Running");
    }

    #[test]
    fn test_import_body_shape() {
        let body = MethodConfigImport::dockstore(
            "drs-billing-project",
            "UM_aligner_wdl",
            "github.com/DataBiosphere/topmed-workflows/UM_aligner_wdl",
            "1.32.0",
        );
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["rootEntityType"], "");
        assert_eq!(value["methodConfigVersion"], 1);
        assert_eq!(value["deleted"], false);
        assert_eq!(value["methodRepoMethod"]["sourceRepo"], "dockstore");
        assert_eq!(value["inputs"], json!({}));
    }

    #[test]
    fn test_prod_submission_omits_entity() {
        let req = SubmissionRequest {
            method_configuration_namespace: "drs_tests".to_string(),
            method_configuration_name: "md5sum".to_string(),
            entity_type: None,
            entity_name: None,
            expression: "this.data_access_test_drs_uriss".to_string(),
            use_call_cache: false,
            delete_intermediate_output_files: true,
            workflow_failure_mode: "NoNewCalls".to_string(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("entityType").is_none());
        assert!(value.get("entityName").is_none());
        assert_eq!(value["useCallCache"], false);
    }

    #[tokio::test]
    async fn test_delete_twice_yields_not_found() {
        let deleted = Arc::new(AtomicBool::new(false));
        let router = Router::new().route(
            "/api/workspaces/{ns}/{ws}",
            delete(move |Path((_ns, _ws)): Path<(String, String)>| {
                let deleted = deleted.clone();
                async move {
                    if deleted.swap(true, Ordering::SeqCst) {
                        (StatusCode::NOT_FOUND, "workspace not found")
                    } else {
                        (StatusCode::ACCEPTED, "deleting")
                    }
                }
            }),
        );
        let rest = RestClient::new(&stub::serve(router).await, None).unwrap();
        let rawls = RawlsClient::new(rest);

        let first = rawls.delete_workspace("ns", "ws").await.unwrap();
        assert_eq!(first, DeleteOutcome::Accepted(StatusCode::ACCEPTED));
        let second = rawls.delete_workspace("ns", "ws").await.unwrap();
        assert_eq!(second, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_delete_forbidden_is_an_error() {
        let router = Router::new().route(
            "/api/workspaces/{ns}/{ws}",
            delete(|| async { (StatusCode::FORBIDDEN, "nope") }),
        );
        let rawls = RawlsClient::new(RestClient::new(&stub::serve(router).await, None).unwrap());
        let err = rawls.delete_workspace("ns", "ws").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_create_workspace_decodes_details() {
        let router = Router::new().route(
            "/api/workspaces",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "namespace": body["namespace"],
                    "name": body["name"],
                    "workspaceId": "2c6f0c8e",
                    "createdBy": "biodata.integration.test.mule@gmail.com",
                    "bucketName": "fc-2c6f0c8e"
                }))
            }),
        );
        let rawls = RawlsClient::new(RestClient::new(&stub::serve(router).await, None).unwrap());
        let ws = rawls.create_workspace("proj", "my ws").await.unwrap();
        assert_eq!(ws.name, "my ws");
        assert_eq!(ws.workspace_id.as_deref(), Some("2c6f0c8e"));
        assert_eq!(ws.created_by, "biodata.integration.test.mule@gmail.com");
    }
}
