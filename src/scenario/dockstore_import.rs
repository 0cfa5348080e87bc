//! Dockstore workflow import into a Terra workspace.

use reqwest::StatusCode;
use tracing::{info, warn};

use super::{Checks, Platform, Scenario, ScenarioContext, ScenarioError};
use crate::clients::rawls::{MethodConfigImport, MethodConfigSummary};
use crate::clients::ApiError;
use crate::config::Stage;

pub const METHOD_NAME: &str = "UM_aligner_wdl";
pub const METHOD_PATH: &str = "github.com/DataBiosphere/topmed-workflows/UM_aligner_wdl";
pub const METHOD_VERSION: &str = "1.32.0";

/// Whether the Dockstore aligner workflow is among `configs`.
pub fn workflow_seen(configs: &[MethodConfigSummary]) -> bool {
    configs.iter().any(|c| {
        let m = &c.method_repo_method;
        m.method_path == METHOD_PATH
            && m.source_repo == "dockstore"
            && m.method_version == METHOD_VERSION
    })
}

/// Import, re-import (conflict), list, delete, list again.
pub struct DockstoreImport;

#[async_trait::async_trait]
impl Scenario for DockstoreImport {
    fn id(&self) -> &'static str {
        "dockstore-import"
    }

    fn test_name(&self, _stage: Stage) -> &'static str {
        "test_dockstore_import_in_terra"
    }

    fn platform(&self) -> Platform {
        Platform::Terra
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
        let ns = ctx.config.billing_project();
        let ws = ctx.config.terra.dockstore_workspace.as_str();
        let import = MethodConfigImport::dockstore(ns, METHOD_NAME, METHOD_PATH, METHOD_VERSION);
        let mut checks = Checks::new();

        info!(workspace = ws, "importing dockstore workflow");
        let response = ctx.rawls.import_method_config(ns, ws, &import).await?;
        let method = &response.method_configuration.method_repo_method;
        checks.check_eq(
            "Dockstore Import Response: sourceRepo",
            method.source_repo.as_str(),
            "dockstore",
        );
        checks.check_eq(
            "Dockstore Import Response: methodPath",
            method.method_path.as_str(),
            METHOD_PATH,
        );
        checks.check_eq(
            "Dockstore Import Response: methodVersion",
            method.method_version.as_str(),
            METHOD_VERSION,
        );

        match ctx.rawls.import_method_config(ns, ws, &import).await {
            Ok(_) => warn!("second import was accepted instead of conflicting"),
            Err(e) => match e.status() {
                Some(status) => {
                    checks.check_eq(
                        "Dockstore Import Response: 409 conflict",
                        status,
                        StatusCode::CONFLICT,
                    );
                }
                None => return Err(e.into()),
            },
        }

        let configs = ctx.rawls.list_method_configs(ns, ws).await?;
        checks.check("Dockstore Check Workflow Seen", workflow_seen(&configs), || {
            format!("{METHOD_PATH}@{METHOD_VERSION} not among {} method configs", configs.len())
        });

        info!("deleting imported workflow");
        ctx.rawls.delete_method_config(ns, ws, ns, METHOD_NAME).await?;

        let configs = ctx.rawls.list_method_configs(ns, ws).await?;
        checks.check("Dockstore Check Workflow Not Seen", !workflow_seen(&configs), || {
            format!("{METHOD_PATH}@{METHOD_VERSION} still listed after deletion")
        });

        checks.finish()
    }

    async fn cleanup(&self, ctx: &ScenarioContext<'_>) -> Result<(), ApiError> {
        let ns = ctx.config.billing_project();
        let ws = ctx.config.terra.dockstore_workspace.as_str();
        match ctx.rawls.delete_method_config(ns, ws, ns, METHOD_NAME).await {
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(()),
            other => other,
        }
    }
}
