//! Sequential scenario execution.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::{Applicability, Scenario, ScenarioContext, ScenarioError};
use crate::config::Stage;
use crate::report::{OutcomeStatus, TestOutcome};

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub outcome: TestOutcome,
    /// Rendered error for failed scenarios.
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Everything a run produced, in execution order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub stage: Stage,
    pub results: Vec<ScenarioResult>,
    /// `(test name, reason)` for scenarios that did not run.
    pub skipped: Vec<(String, String)>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.outcome.status == OutcomeStatus::Success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results
            .iter()
            .filter(|r| r.outcome.status == OutcomeStatus::Failure)
    }

    /// Process exit code for CI: 0 when every executed scenario passed.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Run `scenarios` one after another, each followed by its cleanup phase.
pub async fn run_scenarios(
    ctx: &ScenarioContext<'_>,
    scenarios: &[Box<dyn Scenario>],
) -> RunSummary {
    let stage = ctx.stage();
    let mut summary = RunSummary {
        run_id: Uuid::new_v4(),
        stage,
        results: Vec::new(),
        skipped: Vec::new(),
    };
    info!(run_id = %summary.run_id, %stage, count = scenarios.len(), "starting integration run");

    for scenario in scenarios {
        let test_name = scenario.test_name(stage);
        if let Applicability::Skip(reason) = scenario.applicability(ctx) {
            info!(test = test_name, %reason, "skipping scenario");
            summary.skipped.push((test_name.to_string(), reason));
            continue;
        }

        let span = tracing::info_span!("scenario", test = test_name);
        let result = run_one(ctx, scenario.as_ref(), test_name)
            .instrument(span)
            .await;
        summary.results.push(result);
    }

    info!(
        run_id = %summary.run_id,
        executed = summary.results.len(),
        skipped = summary.skipped.len(),
        passed = summary.all_passed(),
        "integration run finished"
    );
    summary
}

async fn run_one(
    ctx: &ScenarioContext<'_>,
    scenario: &dyn Scenario,
    test_name: &str,
) -> ScenarioResult {
    info!("running scenario");
    let start = Instant::now();
    let result = scenario.run(ctx).await;

    // Cleanup must never mask the scenario's own result.
    if let Err(e) = scenario.cleanup(ctx).await {
        warn!(error = %e, "cleanup failed; remote state may be left behind");
    }

    let elapsed = start.elapsed();
    let (status, error) = match result {
        Ok(()) => {
            info!(?elapsed, "scenario passed");
            (OutcomeStatus::Success, None)
        }
        Err(e) => {
            let polled_for = match &e {
                ScenarioError::Poll(p) => p.elapsed(),
                _ => None,
            };
            error!(?elapsed, ?polled_for, error = %e, "scenario failed");
            (OutcomeStatus::Failure, Some(e.to_string()))
        }
    };

    ScenarioResult {
        outcome: TestOutcome {
            test_name: test_name.to_string(),
            status,
            timestamp: Utc::now(),
        },
        error,
        elapsed,
    }
}
