use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use super::{ModelClient, Step, StepOutcome, expect_array};
use crate::error::StepError;
use crate::planner::prompts::{GENERATE_DAY_WISE_PLAN_PROMPT, day_plan_user_prompt};
use crate::planner::state::{StepName, TripState, TripUpdate};

/// Arranges identified attractions into a day-by-day schedule.
pub struct GenerateDayWisePlan {
    model: ModelClient,
}

impl GenerateDayWisePlan {
    pub fn new(model: ModelClient) -> Self {
        Self { model }
    }

    async fn plan(&self, state: &TripState) -> Result<Vec<Value>, StepError> {
        let attractions = state
            .attractions
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or(StepError::NoAttractions)?;

        // Without a stated duration, allow one day per attraction.
        let duration = state
            .duration_days
            .unwrap_or_else(|| u32::try_from(attractions.len()).unwrap_or(u32::MAX));
        let attractions_json = serde_json::to_string(attractions)?;

        let value = self
            .model
            .complete_json(
                GENERATE_DAY_WISE_PLAN_PROMPT,
                day_plan_user_prompt(state, duration, &attractions_json),
            )
            .await?;
        expect_array(value)
    }
}

#[async_trait]
impl Step for GenerateDayWisePlan {
    fn name(&self) -> StepName {
        StepName::GenerateDayWisePlan
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        let update = match self.plan(state).await {
            Ok(days) => {
                info!(days = days.len(), "Day-wise plan generated");
                TripUpdate {
                    day_wise_plan: Some(days),
                    ..TripUpdate::for_step(self.name())
                }
            }
            Err(StepError::NoAttractions) => TripUpdate {
                day_wise_plan: Some(Vec::new()),
                ..TripUpdate::for_step(self.name()).failed(StepError::NoAttractions.to_string())
            },
            Err(e) => {
                error!(error = %e, "Error generating day-wise plan");
                TripUpdate {
                    day_wise_plan: Some(Vec::new()),
                    ..TripUpdate::for_step(self.name())
                        .failed(format!("Error generating day-wise plan: {e}"))
                }
            }
        };
        StepOutcome::Update(update)
    }
}
