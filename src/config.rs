//! Harness configuration.
//!
//! A [`HarnessConfig`] is built once at process start from, in order:
//! compiled-in defaults, an optional TOML file, and environment overrides.
//! It is then passed by reference to every component and never mutated.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::poll::PollPolicy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("please set BDCAT_STAGE to \"prod\" or \"staging\" (got \"{0}\")")]
    InvalidStage(String),

    #[error("{var} must be a whole number of seconds (got \"{value}\")")]
    InvalidSeconds { var: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Deployment tier the suite is pointed at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Staging,
    Prod,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Staging => write!(f, "staging"),
            Stage::Prod => write!(f, "prod"),
        }
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staging" => Ok(Stage::Staging),
            "prod" => Ok(Stage::Prod),
            other => Err(ConfigError::InvalidStage(other.to_string())),
        }
    }
}

pub const GEN3_PROD_URL: &str = "https://gen3.biodatacatalyst.nhlbi.nih.gov";
pub const GEN3_STAGING_URL: &str = "https://staging.gen3.biodatacatalyst.nhlbi.nih.gov";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for a harness run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub stage: Stage,
    pub domains: DomainConfig,
    pub terra: TerraConfig,
    pub polling: PollingConfig,
    pub auth: AuthConfig,
    pub results: ResultsConfig,
    pub notify: NotifyConfig,
    pub scenarios: ScenarioToggles,
}

impl HarnessConfig {
    /// Parse a TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded harness configuration");
        Ok(config)
    }

    /// Build the configuration for this process.
    ///
    /// The file is taken from `path`, else from `BDCAT_CONFIG`, else the
    /// compiled-in defaults are used. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("BDCAT_CONFIG").ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_file(&p)?,
            None => {
                debug!("no config file given, using compiled-in defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(stage) = lookup("BDCAT_STAGE") {
            self.stage = stage.parse()?;
        }
        if let Some(raw) = lookup("MD5SUM_TEST_TIMEOUT") {
            self.polling.workflow_timeout_secs =
                raw.trim().parse().map_err(|_| ConfigError::InvalidSeconds {
                    var: "MD5SUM_TEST_TIMEOUT",
                    value: raw.clone(),
                })?;
        }
        if let Some(token) = lookup("TERRA_ACCESS_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(creds) = lookup("TEST_MULE_CREDS") {
            self.auth.mule_credentials = Some(creds);
        }
        if let Some(db) = lookup("BDCAT_RESULTS_DB") {
            self.results.db_path = PathBuf::from(db);
        }
        if let Some(url) = lookup("BDCAT_NOTIFY_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Some(url) = lookup("SB_BROKER_URL") {
            self.domains.broker = Some(url);
        }
        Ok(())
    }

    /// Gen3 commons for the selected stage.
    pub fn gen3_url(&self) -> &str {
        match self.stage {
            Stage::Staging => self.gen3_staging_url(),
            Stage::Prod => self.gen3_prod_url(),
        }
    }

    pub fn gen3_staging_url(&self) -> &str {
        self.domains.gen3_staging.as_deref().unwrap_or(GEN3_STAGING_URL)
    }

    pub fn gen3_prod_url(&self) -> &str {
        self.domains.gen3_prod.as_deref().unwrap_or(GEN3_PROD_URL)
    }

    pub fn rawls_url(&self) -> &str {
        self.domains.rawls.as_deref().unwrap_or(match self.stage {
            Stage::Staging => "https://rawls.dsde-alpha.broadinstitute.org",
            Stage::Prod => "https://rawls.dsde-prod.broadinstitute.org",
        })
    }

    pub fn orchestration_url(&self) -> &str {
        self.domains.orchestration.as_deref().unwrap_or(match self.stage {
            Stage::Staging => "https://firecloud-orchestration.dsde-alpha.broadinstitute.org",
            Stage::Prod => "https://firecloud-orchestration.dsde-prod.broadinstitute.org",
        })
    }

    /// Seven Bridges test broker. There is no public default.
    pub fn broker_url(&self) -> Option<&str> {
        self.domains.broker.as_deref()
    }

    pub fn billing_project(&self) -> &str {
        self.terra.billing_project.as_deref().unwrap_or(match self.stage {
            Stage::Staging => "drs-billing-project",
            Stage::Prod => "broad-integration-testing",
        })
    }
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// Base URL overrides. Unset entries fall back to the stage defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub gen3_staging: Option<String>,
    pub gen3_prod: Option<String>,
    pub rawls: Option<String>,
    pub orchestration: Option<String>,
    pub broker: Option<String>,
}

// ---------------------------------------------------------------------------
// Terra
// ---------------------------------------------------------------------------

/// Fixed Terra resources the scenarios operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraConfig {
    /// Billing project (workspace namespace). Defaults per stage.
    pub billing_project: Option<String>,
    /// Account the credentials belong to; workspaces must report it as creator.
    pub test_account: String,
    /// Pre-existing workspace used by the Dockstore import scenario.
    pub dockstore_workspace: String,
    /// Pre-existing workspace holding the md5sum DRS configuration.
    pub drs_workspace: String,
    /// Static PFB export imported by the handoff scenario.
    pub pfb_url: String,
}

impl Default for TerraConfig {
    fn default() -> Self {
        Self {
            billing_project: None,
            test_account: "biodata.integration.test.mule@gmail.com".to_string(),
            dockstore_workspace: "BDC_Dockstore_Import_Test".to_string(),
            drs_workspace: "DRS-Test-Workspace".to_string(),
            pfb_url: "https://cdistest-public-test-bucket.s3.amazonaws.com/export_2020-06-02T17_33_36.avro"
                .to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Cadence and deadline for each kind of remote job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub workflow_interval_secs: u64,
    /// Overridden by `MD5SUM_TEST_TIMEOUT`.
    pub workflow_timeout_secs: u64,
    pub pfb_interval_secs: u64,
    pub pfb_timeout_secs: u64,
    pub broker_interval_secs: u64,
    pub broker_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            workflow_interval_secs: 20,
            workflow_timeout_secs: 60 * 60,
            pfb_interval_secs: 2,
            pfb_timeout_secs: 10 * 60,
            broker_interval_secs: 30,
            broker_timeout_secs: 60 * 60,
        }
    }
}

impl PollingConfig {
    pub fn workflow(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.workflow_interval_secs),
            Duration::from_secs(self.workflow_timeout_secs),
        )
    }

    pub fn pfb_import(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.pfb_interval_secs),
            Duration::from_secs(self.pfb_timeout_secs),
        )
    }

    pub fn broker(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.broker_interval_secs),
            Duration::from_secs(self.broker_timeout_secs),
        )
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Where bearer tokens come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Fixed token (`TERRA_ACCESS_TOKEN`). Takes precedence over the helper.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Credential helper printing an access token on stdout.
    pub helper_command: Vec<String>,
    /// Base64 application-default credentials (`TEST_MULE_CREDS`).
    #[serde(skip_serializing)]
    pub mule_credentials: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            helper_command: vec![
                "gcloud".to_string(),
                "auth".to_string(),
                "application-default".to_string(),
                "print-access-token".to_string(),
            ],
            mule_credentials: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Results / notification
// ---------------------------------------------------------------------------

/// Results store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub enabled: bool,
    pub db_path: PathBuf,
    pub table: String,
    /// Create the table on first use.
    pub create: bool,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: PathBuf::from("data/bdcat-interop.db"),
            table: "test_results".to_string(),
            create: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

/// Scenarios that only run when asked for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioToggles {
    /// The md5sum DRS workflow takes minutes to hours; off unless requested.
    pub drs_workflow: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
