//! Seven Bridges test broker: runs a named test plan against a BDC
//! environment and reports the execution's progress.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{segment, ApiError, RestClient};
use crate::config::Stage;
use crate::poll::{JobPhase, JobStatus};

/// Broker-side name of a deployment tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerEnv {
    Staging,
    Production,
}

impl From<Stage> for BrokerEnv {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Staging => BrokerEnv::Staging,
            Stage::Prod => BrokerEnv::Production,
        }
    }
}

impl fmt::Display for BrokerEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerEnv::Staging => write!(f, "staging"),
            BrokerEnv::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest {
    environment: BrokerEnv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerExecution {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobStatus for BrokerExecution {
    fn phase(&self) -> JobPhase {
        match self.status.as_str() {
            "completed" => JobPhase::Succeeded,
            "failed" | "aborted" => JobPhase::Failed,
            _ => JobPhase::Pending,
        }
    }

    fn state(&self) -> String {
        self.status.clone()
    }
}

pub struct BrokerClient {
    rest: RestClient,
}

impl BrokerClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    pub async fn execute_plan(
        &self,
        plan: &str,
        env: BrokerEnv,
    ) -> Result<BrokerExecution, ApiError> {
        let path = format!("/plans/{}/executions", segment(plan));
        self.rest
            .post_json(&path, &ExecuteRequest { environment: env })
            .await
    }

    pub async fn execution(&self, id: &str) -> Result<BrokerExecution, ApiError> {
        self.rest
            .get_json(&format!("/executions/{}", segment(id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub;
    use axum::extract::Path;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_execution_phase() {
        let exec = |s: &str| BrokerExecution {
            id: "e".to_string(),
            status: s.to_string(),
            plan: None,
            extra: Map::new(),
        };
        assert_eq!(exec("queued").phase(), JobPhase::Pending);
        assert_eq!(exec("running").phase(), JobPhase::Pending);
        assert_eq!(exec("completed").phase(), JobPhase::Succeeded);
        assert_eq!(exec("aborted").phase(), JobPhase::Failed);
    }

    #[tokio::test]
    async fn test_execute_plan_sends_environment() {
        let router = Router::new().route(
            "/plans/{plan}/executions",
            post(|Path(plan): Path<String>, Json(body): Json<Value>| async move {
                Json(json!({
                    "id": "exec-1",
                    "status": "queued",
                    "plan": plan,
                    "environment": body["environment"]
                }))
            }),
        );
        let client = BrokerClient::new(RestClient::new(&stub::serve(router).await, None).unwrap());
        let exec = client
            .execute_plan("sbgtests.plans.bdc", BrokerEnv::from(Stage::Prod))
            .await
            .unwrap();
        assert_eq!(exec.plan.as_deref(), Some("sbgtests.plans.bdc"));
        assert_eq!(exec.extra["environment"], "production");
    }
}
