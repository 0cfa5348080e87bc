//! Gen3 PFB export handed off into a fresh Terra workspace.

use std::sync::Mutex;

use chrono::Local;
use reqwest::StatusCode;
use tracing::{error, info};

use super::{Checks, Platform, Scenario, ScenarioContext, ScenarioError};
use crate::clients::rawls::DeleteOutcome;
use crate::clients::ApiError;
use crate::config::Stage;
use crate::poll::poll_until_terminal;

pub fn workspace_name(now: chrono::DateTime<Local>) -> String {
    format!(
        "integration_test_pfb_gen3_to_terra_{}_delete_me",
        now.format("%Y_%m_%d_%H%M%S")
    )
}

/// Create a workspace, import a static PFB, wait for the import, delete the
/// workspace twice (202 then 404).
#[derive(Default)]
pub struct PfbHandoff {
    /// Workspace created by the current run and not yet deleted.
    created: Mutex<Option<String>>,
}

impl PfbHandoff {
    fn remember(&self, workspace: Option<String>) {
        match self.created.lock() {
            Ok(mut slot) => *slot = workspace,
            Err(poisoned) => *poisoned.into_inner() = workspace,
        }
    }

    fn take(&self) -> Option<String> {
        match self.created.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait::async_trait]
impl Scenario for PfbHandoff {
    fn id(&self) -> &'static str {
        "pfb-handoff"
    }

    fn test_name(&self, _stage: Stage) -> &'static str {
        "test_pfb_handoff_from_gen3_to_terra"
    }

    fn platform(&self) -> Platform {
        Platform::Terra
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
        let ns = ctx.config.billing_project();
        let terra = &ctx.config.terra;
        let name = workspace_name(Local::now());
        let mut checks = Checks::new();

        info!(workspace = %name, "creating terra workspace");
        let workspace = ctx.rawls.create_workspace(ns, &name).await?;
        self.remember(Some(name.clone()));
        checks.check(
            "Create a terra workspace: workspaceId",
            workspace.workspace_id.is_some(),
            || "response has no workspaceId".to_string(),
        );
        checks.check_eq(
            "Create a terra workspace: createdBy",
            workspace.created_by.as_str(),
            terra.test_account.as_str(),
        );

        info!(pfb = %terra.pfb_url, "importing static pfb");
        let job = ctx.orchestration.import_pfb(ns, &name, &terra.pfb_url).await?;
        match job.job_id.as_deref() {
            Some(job_id) => {
                let orchestration = &ctx.orchestration;
                let ws = name.as_str();
                let polled = poll_until_terminal(
                    "pfb import",
                    ctx.config.polling.pfb_import(),
                    move || orchestration.pfb_import_status(ns, ws, job_id),
                )
                .await;
                match polled {
                    Ok(done) => {
                        checks.check_eq(
                            "Check on the import static pfb job status.",
                            done.response.status.as_str(),
                            "Done",
                        );
                    }
                    Err(e) => {
                        checks.fail("Check on the import static pfb job status.", e.to_string())
                    }
                }
            }
            None => checks.fail(
                "Import static pfb into the terra workspace.",
                "response has no jobId",
            ),
        }

        info!(workspace = %name, "deleting terra workspace");
        match ctx.rawls.delete_workspace(ns, &name).await? {
            DeleteOutcome::Accepted(status) => {
                self.remember(None);
                if status != StatusCode::ACCEPTED {
                    error!(%status, "workspace deletion response has changed");
                }
            }
            DeleteOutcome::NotFound => {
                self.remember(None);
                checks.fail(
                    "Delete the terra workspace.",
                    format!("could not delete the workspace \"{name}\": 404 Not Found"),
                );
            }
        }
        let again = ctx.rawls.delete_workspace(ns, &name).await?;
        checks.check_eq("Delete the terra workspace: already gone", again, DeleteOutcome::NotFound);

        checks.finish()
    }

    async fn cleanup(&self, ctx: &ScenarioContext<'_>) -> Result<(), ApiError> {
        let Some(name) = self.take() else {
            return Ok(());
        };
        info!(workspace = %name, "removing leftover workspace");
        ctx.rawls
            .delete_workspace(ctx.config.billing_project(), &name)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_workspace_name_embeds_timestamp() {
        let now = Local.with_ymd_and_hms(2020, 6, 2, 17, 33, 36).unwrap();
        assert_eq!(
            workspace_name(now),
            "integration_test_pfb_gen3_to_terra_2020_06_02_173336_delete_me"
        );
    }

    #[test]
    fn test_take_clears_remembered_workspace() {
        let scenario = PfbHandoff::default();
        scenario.remember(Some("ws".to_string()));
        assert_eq!(scenario.take().as_deref(), Some("ws"));
        assert_eq!(scenario.take(), None);
    }
}
