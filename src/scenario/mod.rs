//! Integration scenarios and the context they run in.
//!
//! Each scenario is a fixed sequence of remote calls with literal
//! expectations. Scenarios run one at a time; anything they create remotely
//! is removed again in their cleanup phase.

pub mod checks;
pub mod dockstore_import;
pub mod drs_workflow;
pub mod gen3_version;
pub mod pfb_handoff;
pub mod runner;
pub mod sevenbridges;

use std::sync::Arc;

use thiserror::Error;

use crate::auth::TokenProvider;
use crate::clients::{
    ApiError, BrokerClient, Gen3Client, OrchestrationClient, RawlsClient, RestClient,
};
use crate::config::{HarnessConfig, Stage};
use crate::poll::PollError;

pub use checks::{CheckFailure, Checks};
pub use runner::{run_scenarios, RunSummary, ScenarioResult};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{} sub-assertion(s) failed:\n{}", .0.len(), render_failures(.0))]
    Assertions(Vec<CheckFailure>),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

fn render_failures(failures: &[CheckFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("  - {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Platform family a scenario primarily exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Gen3,
    Terra,
    SevenBridges,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Gen3 => write!(f, "gen3"),
            Platform::Terra => write!(f, "terra"),
            Platform::SevenBridges => write!(f, "seven-bridges"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicability {
    Run,
    Skip(String),
}

/// Clients and configuration shared by every scenario in a run.
pub struct ScenarioContext<'a> {
    pub config: &'a HarnessConfig,
    pub gen3_staging: Gen3Client,
    pub gen3_prod: Gen3Client,
    pub rawls: RawlsClient,
    pub orchestration: OrchestrationClient,
    pub broker: Option<BrokerClient>,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(
        config: &'a HarnessConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ApiError> {
        let broker = match config.broker_url() {
            Some(url) => Some(BrokerClient::new(RestClient::new(url, Some(tokens.clone()))?)),
            None => None,
        };
        Ok(Self {
            config,
            gen3_staging: Gen3Client::new(config.gen3_staging_url())?,
            gen3_prod: Gen3Client::new(config.gen3_prod_url())?,
            rawls: RawlsClient::new(RestClient::new(config.rawls_url(), Some(tokens.clone()))?),
            orchestration: OrchestrationClient::new(RestClient::new(
                config.orchestration_url(),
                Some(tokens),
            )?),
            broker,
        })
    }

    pub fn stage(&self) -> Stage {
        self.config.stage
    }
}

#[async_trait::async_trait]
pub trait Scenario: Send + Sync {
    /// Selector used on the command line.
    fn id(&self) -> &'static str;

    /// Name recorded in the results store.
    fn test_name(&self, stage: Stage) -> &'static str;

    fn platform(&self) -> Platform;

    fn applicability(&self, _ctx: &ScenarioContext<'_>) -> Applicability {
        Applicability::Run
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError>;

    /// Best-effort removal of remote state. Errors are logged by the runner.
    async fn cleanup(&self, _ctx: &ScenarioContext<'_>) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Every scenario, in execution order.
pub fn catalog() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(gen3_version::Gen3VersionCheck),
        Box::new(dockstore_import::DockstoreImport),
        Box::new(drs_workflow::DrsWorkflow),
        Box::new(pfb_handoff::PfbHandoff::default()),
        Box::new(sevenbridges::SevenBridgesBdc),
    ]
}

#[derive(Debug, Error)]
#[error("unknown scenario '{0}' (see `list-scenarios`)")]
pub struct UnknownScenario(pub String);

/// Scenarios matching `ids`, in catalog order. An empty selection means all.
pub fn select(ids: &[String]) -> Result<Vec<Box<dyn Scenario>>, UnknownScenario> {
    let all = catalog();
    if let Some(unknown) = ids.iter().find(|id| !all.iter().any(|s| s.id() == id.as_str())) {
        return Err(UnknownScenario(unknown.clone()));
    }
    if ids.is_empty() {
        return Ok(all);
    }
    Ok(all
        .into_iter()
        .filter(|s| ids.iter().any(|id| id == s.id()))
        .collect())
}
