//! Bounded polling of asynchronous remote jobs.
//!
//! A job is fetched, classified, and either returned, failed, or retried after
//! a fixed interval until its deadline passes. There is no backoff.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::clients::ApiError;

/// Where a remote job stands, as far as the harness is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    /// Submitted, queued, or running.
    Pending,
    Succeeded,
    Failed,
}

/// A status payload that can be classified into a [`JobPhase`].
pub trait JobStatus {
    fn phase(&self) -> JobPhase;

    /// Short human-readable state for progress logs.
    fn state(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Terminal response plus the bookkeeping gathered on the way.
#[derive(Debug)]
pub struct Polled<T> {
    pub response: T,
    pub retries: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("{job} did not succeed after {elapsed:?}:\n{payload}")]
    JobFailed {
        job: String,
        elapsed: Duration,
        payload: String,
    },

    #[error(
        "{job} timed out: expected completion within {timeout:?}, but took longer than {:.1} minutes",
        .elapsed.as_secs_f64() / 60.0
    )]
    Timeout {
        job: String,
        elapsed: Duration,
        timeout: Duration,
        payload: String,
    },

    #[error("status check for {job} failed: {source}")]
    Fetch {
        job: String,
        #[source]
        source: ApiError,
    },
}

impl PollError {
    /// Time spent polling before the error, when known.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            PollError::JobFailed { elapsed, .. } | PollError::Timeout { elapsed, .. } => {
                Some(*elapsed)
            }
            PollError::Fetch { .. } => None,
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Poll `fetch` until the job it reports reaches a terminal phase.
///
/// A `Failed` phase returns immediately regardless of the deadline. Once the
/// deadline has passed a non-terminal response yields [`PollError::Timeout`].
/// A timeout too large to represent as an instant means no deadline.
pub async fn poll_until_terminal<T, F, Fut>(
    job: &str,
    policy: PollPolicy,
    mut fetch: F,
) -> Result<Polled<T>, PollError>
where
    T: JobStatus + Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let start = Instant::now();
    let deadline = start.checked_add(policy.timeout);
    let mut retries = 0u32;

    loop {
        let response = fetch().await.map_err(|source| PollError::Fetch {
            job: job.to_string(),
            source,
        })?;

        match response.phase() {
            JobPhase::Failed => {
                let elapsed = start.elapsed();
                tracing::error!(%job, state = %response.state(), ?elapsed, "remote job failed");
                return Err(PollError::JobFailed {
                    job: job.to_string(),
                    elapsed,
                    payload: pretty(&response),
                });
            }
            JobPhase::Succeeded => {
                let elapsed = start.elapsed();
                tracing::info!(%job, retries, ?elapsed, "remote job finished");
                return Ok(Polled {
                    response,
                    retries,
                    elapsed,
                });
            }
            JobPhase::Pending => {
                let now = Instant::now();
                if deadline.map_or(true, |d| now < d) {
                    tracing::info!(
                        %job,
                        state = %response.state(),
                        "job still running, checking again in {:?}",
                        policy.interval
                    );
                    tokio::time::sleep(policy.interval).await;
                    retries += 1;
                } else {
                    let elapsed = now - start;
                    tracing::error!(%job, ?elapsed, "gave up waiting for remote job");
                    return Err(PollError::Timeout {
                        job: job.to_string(),
                        elapsed,
                        timeout: policy.timeout,
                        payload: pretty(&response),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[derive(Debug, Serialize)]
    struct FakeStatus {
        status: String,
    }

    impl JobStatus for FakeStatus {
        fn phase(&self) -> JobPhase {
            match self.status.as_str() {
                "Done" => JobPhase::Succeeded,
                "Failed" => JobPhase::Failed,
                _ => JobPhase::Pending,
            }
        }

        fn state(&self) -> String {
            self.status.clone()
        }
    }

    type Fetched = std::future::Ready<Result<FakeStatus, ApiError>>;

    fn sequence(states: &[&'static str]) -> impl FnMut() -> Fetched {
        let mut states = states.to_vec().into_iter();
        move || {
            let status = states.next().unwrap_or("Pending").to_string();
            std::future::ready(Ok(FakeStatus { status }))
        }
    }

    #[tokio::test]
    async fn test_returns_after_two_retries() {
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(60));
        let polled = poll_until_terminal("job", policy, sequence(&["Pending", "Pending", "Done"]))
            .await
            .unwrap();
        assert_eq!(polled.retries, 2);
        assert_eq!(polled.response.status, "Done");
    }

    #[tokio::test]
    async fn test_times_out_with_elapsed_at_least_timeout() {
        let policy = PollPolicy::new(Duration::from_millis(5), Duration::from_millis(40));
        let err = poll_until_terminal("job", policy, sequence(&[]))
            .await
            .unwrap_err();
        match err {
            PollError::Timeout { elapsed, timeout, .. } => {
                assert!(elapsed >= timeout);
                assert_eq!(timeout, Duration::from_millis(40));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let mut config = crate::config::HarnessConfig::default();
        config
            .apply_env(|key| (key == "MD5SUM_TEST_TIMEOUT").then(|| u64::MAX.to_string()))
            .unwrap();
        let mut policy = config.polling.workflow();
        policy.interval = Duration::ZERO;

        let polled = poll_until_terminal("job", policy, sequence(&["Pending", "Done"]))
            .await
            .unwrap();
        assert_eq!(polled.retries, 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_wait_for_deadline() {
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(3600));
        let err = poll_until_terminal("job", policy, sequence(&["Pending", "Failed", "Done"]))
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::JobFailed { .. }));
        assert!(err.elapsed().unwrap() < Duration::from_secs(5));
        assert!(err.to_string().contains("\"Failed\""));
    }

    #[tokio::test]
    async fn test_fetch_error_aborts() {
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_secs(60));
        let err = poll_until_terminal::<FakeStatus, _, _>("job", policy, || {
            std::future::ready(Err(ApiError::Status {
                endpoint: "GET /jobs/1".to_string(),
                status: StatusCode::BAD_GATEWAY,
                body: String::new(),
            }))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PollError::Fetch { .. }));
        assert!(err.elapsed().is_none());
    }
}
