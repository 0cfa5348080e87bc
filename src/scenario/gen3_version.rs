//! Gen3 release ordering across environments.

use tracing::info;

use super::{Checks, Platform, Scenario, ScenarioContext, ScenarioError};
use crate::config::Stage;
use crate::version::check_release_order;

/// Staging must run the same Gen3 release as production or a newer one.
pub struct Gen3VersionCheck;

#[async_trait::async_trait]
impl Scenario for Gen3VersionCheck {
    fn id(&self) -> &'static str {
        "gen3-version"
    }

    fn test_name(&self, _stage: Stage) -> &'static str {
        "test_staging_versus_prod_version"
    }

    fn platform(&self) -> Platform {
        Platform::Gen3
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
        info!(
            url = %ctx.gen3_prod.base_url(),
            "checking the gen3 release version on bdcat prod"
        );
        let prod = ctx.gen3_prod.index_version().await?;

        info!(
            url = %ctx.gen3_staging.base_url(),
            "checking the gen3 release version on bdcat staging"
        );
        let staging = ctx.gen3_staging.index_version().await?;

        info!(staging = %staging.version, prod = %prod.version, "comparing releases");
        let mut checks = Checks::new();
        if let Err(violation) = check_release_order(&staging.version, &prod.version) {
            checks.fail("staging release >= prod release", violation.to_string());
        }
        checks.finish()
    }
}
