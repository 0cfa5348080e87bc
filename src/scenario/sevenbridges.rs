//! Seven Bridges BDC test plan, executed through the test broker.

use tracing::info;

use super::{Applicability, Platform, Scenario, ScenarioContext, ScenarioError};
use crate::clients::broker::BrokerEnv;
use crate::config::Stage;
use crate::poll::poll_until_terminal;

pub const BDC_PLAN: &str = "sbgtests.plans.bdc";

pub struct SevenBridgesBdc;

#[async_trait::async_trait]
impl Scenario for SevenBridgesBdc {
    fn id(&self) -> &'static str {
        "sevenbridges-bdc"
    }

    fn test_name(&self, stage: Stage) -> &'static str {
        match stage {
            Stage::Staging => "test_bdc_staging",
            Stage::Prod => "test_bdc_production",
        }
    }

    fn platform(&self) -> Platform {
        Platform::SevenBridges
    }

    fn applicability(&self, ctx: &ScenarioContext<'_>) -> Applicability {
        if ctx.broker.is_some() {
            Applicability::Run
        } else {
            Applicability::Skip("no test broker configured (SB_BROKER_URL)".to_string())
        }
    }

    async fn run(&self, ctx: &ScenarioContext<'_>) -> Result<(), ScenarioError> {
        let broker = ctx
            .broker
            .as_ref()
            .ok_or(ScenarioError::NotConfigured("seven bridges test broker"))?;
        let env = BrokerEnv::from(ctx.stage());

        info!(plan = BDC_PLAN, %env, "starting broker test plan");
        let execution = broker.execute_plan(BDC_PLAN, env).await?;
        let id = execution.id.as_str();

        let polled = poll_until_terminal("sb broker plan", ctx.config.polling.broker(), move || {
            broker.execution(id)
        })
        .await?;
        info!(execution = id, retries = polled.retries, "broker test plan completed");
        Ok(())
    }
}
