//! Outcome reporting: results table plus an optional chat notification.
//!
//! Reporting is observability, not correctness. Every failure here is logged
//! and swallowed so it can never change the run's exit code.

pub mod notify;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::HarnessConfig;
use crate::scenario::RunSummary;
use crate::storage::ResultsStore;

pub use notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => write!(f, "success"),
            OutcomeStatus::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown outcome status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for OutcomeStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(OutcomeStatus::Success),
            "failure" => Ok(OutcomeStatus::Failure),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One scenario's result. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_name: String,
    pub status: OutcomeStatus,
    pub timestamp: DateTime<Utc>,
}

/// Fans a run summary out to the configured sinks.
#[derive(Default)]
pub struct Reporter {
    store: Option<ResultsStore>,
    notifier: Option<Notifier>,
}

impl Reporter {
    pub fn new(store: Option<ResultsStore>, notifier: Option<Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Build sinks from configuration. A sink that cannot be set up is
    /// logged and left out.
    pub fn from_config(config: &HarnessConfig) -> Self {
        let store = if config.results.enabled {
            match ResultsStore::open(
                &config.results.db_path,
                &config.results.table,
                config.results.create,
            ) {
                Ok(store) => Some(store),
                Err(e) => {
                    error!(
                        path = %config.results.db_path.display(),
                        error = %format!("{e:#}"),
                        "results store unavailable, outcomes will not be recorded"
                    );
                    None
                }
            }
        } else {
            None
        };

        let notifier = config.notify.webhook_url.as_deref().and_then(|url| {
            Notifier::new(url)
                .map_err(|e| error!(error = %e, "notification endpoint unavailable"))
                .ok()
        });

        Self { store, notifier }
    }

    /// Record every outcome and post the summary. Returns how many outcomes
    /// were stored.
    pub async fn publish(&self, summary: &RunSummary) -> usize {
        let mut stored = 0;
        if let Some(store) = &self.store {
            for test in newly_failing(store, summary) {
                warn!(%test, "test passed on its previous run and fails now");
            }
            for result in &summary.results {
                match store.log_test_result(summary.run_id, &result.outcome) {
                    Ok(()) => stored += 1,
                    Err(e) => error!(
                        test = %result.outcome.test_name,
                        error = %format!("{e:#}"),
                        "failed to log test result"
                    ),
                }
            }
            info!(stored, table = %store.table(), "recorded test outcomes");
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.post_summary(summary).await {
                error!(error = %format!("{e:#}"), "failed to post run summary");
            }
        }
        stored
    }
}

/// Failed tests whose last recorded outcome was a success. Must be called
/// before the current run's outcomes are stored.
fn newly_failing(store: &ResultsStore, summary: &RunSummary) -> Vec<String> {
    summary
        .failures()
        .map(|r| r.outcome.test_name.as_str())
        .filter(|name| matches!(store.latest_status(name), Ok(Some(OutcomeStatus::Success))))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{RunSummary, ScenarioResult};
    use std::time::Duration;
    use uuid::Uuid;

    fn summary(names: &[(&str, OutcomeStatus)]) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            stage: crate::config::Stage::Staging,
            results: names
                .iter()
                .map(|(name, status)| ScenarioResult {
                    outcome: TestOutcome {
                        test_name: name.to_string(),
                        status: *status,
                        timestamp: Utc::now(),
                    },
                    error: None,
                    elapsed: Duration::from_millis(1),
                })
                .collect(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_status_round_trips_through_text() {
        assert_eq!("success".parse::<OutcomeStatus>().unwrap(), OutcomeStatus::Success);
        assert_eq!(OutcomeStatus::Failure.to_string(), "failure");
        assert!("skipped".parse::<OutcomeStatus>().is_err());
    }

    #[tokio::test]
    async fn test_publish_stores_every_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(&dir.path().join("r.db"), "test_results", true).unwrap();
        let reporter = Reporter::new(Some(store), None);
        let run = summary(&[
            ("test_staging_versus_prod_version", OutcomeStatus::Success),
            ("test_pfb_handoff_from_gen3_to_terra", OutcomeStatus::Failure),
        ]);
        assert_eq!(reporter.publish(&run).await, 2);
    }

    #[tokio::test]
    async fn test_newly_failing_compares_with_last_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(&dir.path().join("r.db"), "test_results", true).unwrap();
        let first = summary(&[
            ("test_dockstore_import_in_terra", OutcomeStatus::Success),
            ("test_pfb_handoff_from_gen3_to_terra", OutcomeStatus::Failure),
        ]);
        assert!(newly_failing(&store, &first).is_empty());
        let reporter = Reporter::new(Some(store), None);
        reporter.publish(&first).await;

        let second = summary(&[
            ("test_dockstore_import_in_terra", OutcomeStatus::Failure),
            ("test_pfb_handoff_from_gen3_to_terra", OutcomeStatus::Failure),
        ]);
        let store = reporter.store.as_ref().unwrap();
        assert_eq!(newly_failing(store, &second), ["test_dockstore_import_in_terra"]);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // No table and no create: every insert fails.
        let store = ResultsStore::open(&dir.path().join("r.db"), "test_results", false).unwrap();
        let reporter = Reporter::new(Some(store), None);
        let run = summary(&[("t", OutcomeStatus::Success)]);
        assert_eq!(reporter.publish(&run).await, 0);
    }

    #[tokio::test]
    async fn test_unreachable_notifier_is_swallowed() {
        let notifier = Notifier::new("http://127.0.0.1:9/hook").unwrap();
        let reporter = Reporter::new(None, Some(notifier));
        assert_eq!(reporter.publish(&summary(&[("t", OutcomeStatus::Success)])).await, 0);
    }
}
