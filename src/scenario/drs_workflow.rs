//! md5sum over a Gen3 DRS URI, run as a Terra workflow submission.

use serde_json::Value;
use tracing::info;

use super::{Applicability, Checks, Platform, Scenario, ScenarioContext, ScenarioError};
use crate::clients::rawls::SubmissionRequest;
use crate::config::Stage;
use crate::poll::poll_until_terminal;

/// Submission for the `drs_tests/md5sum` configuration. The production
/// workspace binds the input set on the configuration itself.
pub fn md5sum_request(stage: Stage) -> SubmissionRequest {
    let (entity_type, entity_name) = match stage {
        Stage::Staging => (
            Some("data_access_test_drs_uris_set".to_string()),
            Some("md5sum_2020-05-19T17-52-42".to_string()),
        ),
        Stage::Prod => (None, None),
    };
    SubmissionRequest {
        method_configuration_namespace: "drs_tests".to_string(),
        method_configuration_name: "md5sum".to_string(),
        entity_type,
        entity_name,
        expression: "this.data_access_test_drs_uriss".to_string(),
        use_call_cache: false,
        delete_intermediate_output_files: true,
        workflow_failure_mode: "NoNewCalls".to_string(),
    }
}

pub struct DrsWorkflow;

#[async_trait::async_trait]
impl Scenario for DrsWorkflow {
    fn id(&self) -> &'static str {
        "drs-workflow"
    }

    fn test_name(&self, _stage: Stage) -> &'static str {
        "test_drs_workflow_in_terra"
    }

    fn platform(&self) -> Platform {
        Platform::Terra
    }

    fn applicability(&self, ctx: &ScenarioContext<'_>) -> Applicability {
        if ctx.config.scenarios.drs_workflow {
            Applicability::Run
        } else {
            Applicability::Skip("long-running; enable with --include-drs".to_string())
        }
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
        let ns = ctx.config.billing_project();
        let ws = ctx.config.terra.drs_workspace.as_str();
        let rawls = &ctx.rawls;
        let mut checks = Checks::new();

        let submitted = rawls
            .submit_workflow(ns, ws, &md5sum_request(ctx.stage()))
            .await?;
        checks.check_eq(
            "Dockstore Workflow Run Submitted",
            submitted.status.as_str(),
            "Submitted",
        );
        let first_input = submitted
            .workflows
            .first()
            .and_then(|w| w.input_resolutions.first())
            .and_then(|r| r.value.as_ref())
            .and_then(Value::as_str);
        checks.check(
            "Dockstore Workflow Run Responds with DRS.",
            first_input.is_some_and(|v| v.starts_with("drs://")),
            || format!("first input resolution is {first_input:?}"),
        );

        let submission_id = submitted.submission_id.as_str();
        info!(%submission_id, "md5sum workflow submitted");
        let polled = poll_until_terminal("md5sum workflow", ctx.config.polling.workflow(), move || {
            rawls.submission_status(ns, ws, submission_id)
        })
        .await?;
        info!(
            minutes = polled.elapsed.as_secs_f64() / 60.0,
            retries = polled.retries,
            "md5sum workflow finished"
        );

        checks.check_eq(
            "Dockstore Workflow Run Completed Successfully",
            polled.response.first_workflow_status(),
            Some("Succeeded"),
        );
        checks.finish()
    }
}
