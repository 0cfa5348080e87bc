//! Chat webhook notification (Slack-style `{"text": ...}` payload).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::report::OutcomeStatus;
use crate::scenario::RunSummary;

pub struct Notifier {
    client: Client,
    url: String,
}

impl Notifier {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build notification client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn post_summary(&self, summary: &RunSummary) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&json!({ "text": render(summary) }))
            .send()
            .await
            .context("notification request failed")?;
        if !resp.status().is_success() {
            bail!("notification endpoint returned HTTP {}", resp.status());
        }
        Ok(())
    }
}

/// Plain-text summary, one line per executed scenario.
pub fn render(summary: &RunSummary) -> String {
    let failed = summary
        .results
        .iter()
        .filter(|r| r.outcome.status == OutcomeStatus::Failure)
        .count();
    let mut text = format!(
        "BDCat interop [{}]: {} passed, {} failed, {} skipped (run {})",
        summary.stage,
        summary.results.len() - failed,
        failed,
        summary.skipped.len(),
        summary.run_id
    );
    for r in &summary.results {
        let mark = match r.outcome.status {
            OutcomeStatus::Success => "ok",
            OutcomeStatus::Failure => "FAILED",
        };
        text.push_str(&format!("\n- {} {}", r.outcome.test_name, mark));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::stub;
    use crate::config::Stage;
    use crate::report::TestOutcome;
    use crate::scenario::ScenarioResult;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: Uuid::nil(),
            stage: Stage::Prod,
            results: vec![ScenarioResult {
                outcome: TestOutcome {
                    test_name: "test_dockstore_import_in_terra".to_string(),
                    status: OutcomeStatus::Failure,
                    timestamp: Utc::now(),
                },
                error: Some("boom".to_string()),
                elapsed: Duration::from_secs(3),
            }],
            skipped: vec![("test_bdc_production".to_string(), "no broker".to_string())],
        }
    }

    #[test]
    fn test_render() {
        let text = render(&summary());
        assert!(text.starts_with("BDCat interop [prod]: 0 passed, 1 failed, 1 skipped"));
        assert!(text.contains("- test_dockstore_import_in_terra FAILED"));
    }

    #[tokio::test]
    async fn test_posts_text_payload() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let router = Router::new()
            .route(
                "/hook",
                post(
                    |State(seen): State<Arc<Mutex<Vec<Value>>>>,
                     Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push(body);
                        "ok"
                    },
                ),
            )
            .with_state(seen.clone());
        let base = stub::serve(router).await;
        let notifier = Notifier::new(&format!("{base}/hook")).unwrap();
        notifier.post_summary(&summary()).await.unwrap();

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0]["text"].as_str().unwrap().contains("1 failed"));
    }
}
