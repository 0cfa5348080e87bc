//! FireCloud Orchestration: service health and PFB imports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{segment, ApiError, RestClient};
use crate::poll::{JobPhase, JobStatus};

/// States an import passes through before it settles.
pub const PFB_PENDING_STATES: [&str; 4] = ["Translating", "ReadyForUpsert", "Upserting", "Pending"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemStatus {
    pub ok: bool,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ok: bool,
    #[serde(default)]
    pub systems: BTreeMap<String, SubsystemStatus>,
}

impl HealthStatus {
    /// Names of subsystems reporting trouble.
    pub fn degraded(&self) -> Vec<&str> {
        self.systems
            .iter()
            .filter(|(_, s)| !s.ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
struct PfbImportRequest<'a> {
    url: &'a str,
}

/// Response to starting a PFB import. `job_id` is optional so its absence
/// can be asserted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfbImportJob {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfbImportStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobStatus for PfbImportStatus {
    fn phase(&self) -> JobPhase {
        if PFB_PENDING_STATES.contains(&self.status.as_str()) {
            JobPhase::Pending
        } else if self.status == "Done" {
            JobPhase::Succeeded
        } else {
            JobPhase::Failed
        }
    }

    fn state(&self) -> String {
        self.status.clone()
    }
}

pub struct OrchestrationClient {
    rest: RestClient,
}

impl OrchestrationClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.rest.get_json("/status").await
    }

    fn import_path(namespace: &str, workspace: &str) -> String {
        format!(
            "/api/workspaces/{}/{}/importPFB",
            segment(namespace),
            segment(workspace)
        )
    }

    pub async fn import_pfb(
        &self,
        namespace: &str,
        workspace: &str,
        pfb_url: &str,
    ) -> Result<PfbImportJob, ApiError> {
        self.rest
            .post_json(
                &Self::import_path(namespace, workspace),
                &PfbImportRequest { url: pfb_url },
            )
            .await
    }

    pub async fn pfb_import_status(
        &self,
        namespace: &str,
        workspace: &str,
        job_id: &str,
    ) -> Result<PfbImportStatus, ApiError> {
        let path = format!("{}/{}", Self::import_path(namespace, workspace), segment(job_id));
        self.rest.get_json(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    fn status(s: &str) -> PfbImportStatus {
        serde_json::from_value(json!({ "jobId": "j", "status": s })).unwrap()
    }

    #[test]
    fn test_pfb_phase() {
        for s in PFB_PENDING_STATES {
            assert_eq!(status(s).phase(), JobPhase::Pending);
        }
        assert_eq!(status("Done").phase(), JobPhase::Succeeded);
        assert_eq!(status("Error").phase(), JobPhase::Failed);
    }

    #[test]
    fn test_degraded_subsystems() {
        let health: HealthStatus = serde_json::from_value(json!({
            "ok": false,
            "systems": {
                "Rawls": { "ok": true },
                "Thurloe": { "ok": false, "messages": ["timeout"] }
            }
        }))
        .unwrap();
        assert_eq!(health.degraded(), vec!["Thurloe"]);
    }

    #[tokio::test]
    async fn test_import_and_status() {
        let router = Router::new()
            .route(
                "/api/workspaces/{ns}/{ws}/importPFB",
                post(|Json(body): Json<Value>| async move {
                    assert!(body["url"].as_str().unwrap().ends_with(".avro"));
                    Json(json!({ "jobId": "job-7" }))
                }),
            )
            .route(
                "/api/workspaces/{ns}/{ws}/importPFB/{job}",
                get(|| async { Json(json!({ "jobId": "job-7", "status": "Upserting" })) }),
            );
        let client =
            OrchestrationClient::new(RestClient::new(&stub::serve(router).await, None).unwrap());

        let job = client
            .import_pfb("proj", "ws", "https://example.org/export.avro")
            .await
            .unwrap();
        assert_eq!(job.job_id.as_deref(), Some("job-7"));

        let st = client.pfb_import_status("proj", "ws", "job-7").await.unwrap();
        assert_eq!(st.phase(), JobPhase::Pending);
    }
}
