//! bdcat-interop -- cross-platform integration tests for BioData Catalyst.
//!
//! The library drives fixed scenarios against Gen3, Terra and the Seven
//! Bridges test broker, then records one pass/fail outcome per scenario.

pub mod auth;
pub mod clients;
pub mod config;
pub mod poll;
pub mod report;
pub mod scenario;
pub mod storage;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::HarnessConfig;
use crate::report::Reporter;
use crate::scenario::{Platform, RunSummary, Scenario, ScenarioContext};

/// Run `scenarios` against the configured stage and, when `report` is set,
/// publish the outcomes to the results store and notification webhook.
pub async fn run_suite(
    config: &HarnessConfig,
    scenarios: &[Box<dyn Scenario>],
    report: bool,
) -> Result<RunSummary> {
    if let Some(encoded) = config.auth.mule_credentials.as_deref() {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("HOME is not set; cannot install service account credentials")?;
        auth::install_mule_credentials(encoded, &home)?;
    }

    let tokens = auth::provider_from_config(&config.auth)?;
    let ctx = ScenarioContext::new(config, tokens)?;

    if scenarios.iter().any(|s| s.platform() == Platform::Terra) {
        match ctx.orchestration.health().await {
            Ok(health) if health.ok => tracing::info!("terra orchestration healthy"),
            Ok(health) => {
                tracing::warn!(degraded = ?health.degraded(), "terra orchestration degraded")
            }
            Err(e) => tracing::warn!(error = %e, "terra status check failed"),
        }
    }

    let summary = scenario::run_scenarios(&ctx, scenarios).await;

    if report {
        Reporter::from_config(config).publish(&summary).await;
    }
    Ok(summary)
}
