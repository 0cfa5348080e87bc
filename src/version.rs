//! Release ordering between Gen3 environments.
//!
//! Versions are calendar strings (`YYYY.MM`) compared as plain strings.
//! Staging may run the same release as production or a newer one; the
//! reverse means a release reached production without cross-org testing.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("staging release {staging} is behind production release {prod}")]
pub struct ReleaseOrderViolation {
    pub staging: String,
    pub prod: String,
}

pub fn check_release_order(staging: &str, prod: &str) -> Result<(), ReleaseOrderViolation> {
    if staging >= prod {
        Ok(())
    } else {
        Err(ReleaseOrderViolation {
            staging: staging.to_string(),
            prod: prod.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_ahead_passes() {
        assert!(check_release_order("2022.01", "2021.12").is_ok());
        assert!(check_release_order("2021.06", "2021.05").is_ok());
    }

    #[test]
    fn test_same_release_passes() {
        assert!(check_release_order("2021.05", "2021.05").is_ok());
    }

    #[test]
    fn test_staging_behind_fails() {
        let err = check_release_order("2021.04", "2021.05").unwrap_err();
        assert_eq!(err.staging, "2021.04");
        assert_eq!(err.prod, "2021.05");
        assert_eq!(
            err.to_string(),
            "staging release 2021.04 is behind production release 2021.05"
        );
    }
}
