//! Sub-assertions that are collected instead of aborting the scenario.

use std::fmt;

use tracing::warn;

use super::ScenarioError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub label: String,
    pub detail: String,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.detail)
    }
}

/// Accumulates failed sub-assertions for one scenario run.
#[derive(Debug, Default)]
pub struct Checks {
    failures: Vec<CheckFailure>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure unconditionally.
    pub fn fail(&mut self, label: &str, detail: impl Into<String>) {
        let failure = CheckFailure {
            label: label.to_string(),
            detail: detail.into(),
        };
        warn!(check = %failure.label, detail = %failure.detail, "sub-assertion failed");
        self.failures.push(failure);
    }

    /// Record a failure when `ok` is false. `detail` is only built on failure.
    pub fn check<F>(&mut self, label: &str, ok: bool, detail: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if !ok {
            self.fail(label, detail());
        }
        ok
    }

    pub fn check_eq<A, E>(&mut self, label: &str, actual: A, expected: E) -> bool
    where
        A: PartialEq<E> + fmt::Debug,
        E: fmt::Debug,
    {
        let ok = actual == expected;
        self.check(label, ok, || format!("expected {expected:?}, got {actual:?}"))
    }

    pub fn failures(&self) -> &[CheckFailure] {
        &self.failures
    }

    pub fn finish(self) -> Result<(), ScenarioError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(ScenarioError::Assertions(self.failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_failure() {
        let mut checks = Checks::new();
        assert!(checks.check_eq("sourceRepo", "dockstore", "dockstore"));
        assert!(!checks.check_eq("methodVersion", "1.31.0", "1.32.0"));
        assert!(!checks.check("seen", false, || "workflow missing".to_string()));
        checks.fail("status", "boom");

        assert_eq!(checks.failures().len(), 3);
        assert_eq!(
            checks.failures()[0].to_string(),
            "methodVersion: expected \"1.32.0\", got \"1.31.0\""
        );
        match checks.finish() {
            Err(ScenarioError::Assertions(failures)) => assert_eq!(failures.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_clean_run_finishes_ok() {
        let mut checks = Checks::new();
        checks.check("ok", true, || unreachable!());
        assert!(checks.finish().is_ok());
    }
}
