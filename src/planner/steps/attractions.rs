use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{ModelClient, Step, StepOutcome, expect_array, shape_error};
use crate::error::StepError;
use crate::planner::prompts::{
    IDENTIFY_ATTRACTIONS_AND_PLAN_PROMPT, IDENTIFY_ATTRACTIONS_PROMPT,
    attractions_and_plan_user_prompt, attractions_user_prompt,
};
use crate::planner::state::{StepName, TripState, TripUpdate};

fn require_destination(state: &TripState) -> Result<(), StepError> {
    match state.destination.as_deref() {
        Some(d) if !d.trim().is_empty() => Ok(()),
        _ => Err(StepError::MissingField {
            field: "destination".into(),
        }),
    }
}

/// Failure update: both planning lists are reset.
fn planning_failed(step: StepName, message: String) -> StepOutcome {
    StepOutcome::Update(TripUpdate {
        attractions: Some(Vec::new()),
        day_wise_plan: Some(Vec::new()),
        ..TripUpdate::for_step(step).failed(message)
    })
}

/// Looks up attractions only; the day plan is a separate step.
pub struct IdentifyAttractions {
    model: ModelClient,
}

impl IdentifyAttractions {
    pub fn new(model: ModelClient) -> Self {
        Self { model }
    }

    async fn identify(&self, state: &TripState) -> Result<Vec<Value>, StepError> {
        require_destination(state)?;
        let value = self
            .model
            .complete_json(IDENTIFY_ATTRACTIONS_PROMPT, attractions_user_prompt(state))
            .await?;
        expect_array(value)
    }
}

#[async_trait]
impl Step for IdentifyAttractions {
    fn name(&self) -> StepName {
        StepName::IdentifyAttractions
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        match self.identify(state).await {
            Ok(attractions) => {
                if attractions.is_empty() {
                    warn!("No attractions returned");
                }
                info!(count = attractions.len(), "Attractions identified");
                StepOutcome::Update(TripUpdate {
                    attractions: Some(attractions),
                    ..TripUpdate::for_step(self.name())
                })
            }
            Err(e) => {
                error!(error = %e, "Error identifying attractions");
                planning_failed(self.name(), format!("Error identifying attractions: {e}"))
            }
        }
    }
}

/// Looks up attractions and builds the day plan in a single model call.
pub struct IdentifyAttractionsAndPlan {
    model: ModelClient,
}

impl IdentifyAttractionsAndPlan {
    pub fn new(model: ModelClient) -> Self {
        Self { model }
    }

    async fn identify_and_plan(
        &self,
        state: &TripState,
    ) -> Result<(Vec<Value>, Vec<Value>), StepError> {
        require_destination(state)?;
        let value = self
            .model
            .complete_json(
                IDENTIFY_ATTRACTIONS_AND_PLAN_PROMPT,
                attractions_and_plan_user_prompt(state),
            )
            .await?;
        let Value::Object(mut result) = value else {
            return Err(shape_error("an object with attractions and day_wise_plan"));
        };

        let mut take_list = |key: &str| match result.remove(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(list) => expect_array(list),
        };
        let attractions = take_list("attractions")?;
        let day_wise_plan = take_list("day_wise_plan")?;
        Ok((attractions, day_wise_plan))
    }
}

#[async_trait]
impl Step for IdentifyAttractionsAndPlan {
    fn name(&self) -> StepName {
        StepName::IdentifyAttractionsAndPlan
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        match self.identify_and_plan(state).await {
            Ok((attractions, day_wise_plan)) => {
                if attractions.is_empty() {
                    warn!("No attractions returned from combined planning call");
                }
                if day_wise_plan.is_empty() {
                    warn!("No day_wise_plan returned from combined planning call");
                }
                info!(
                    attractions = attractions.len(),
                    days = day_wise_plan.len(),
                    "Attractions and day plan generated"
                );
                StepOutcome::Update(TripUpdate {
                    attractions: Some(attractions),
                    day_wise_plan: Some(day_wise_plan),
                    ..TripUpdate::for_step(self.name())
                })
            }
            Err(e) => {
                error!(error = %e, "Error identifying attractions and generating plan");
                planning_failed(
                    self.name(),
                    format!("Error identifying attractions and generating plan: {e}"),
                )
            }
        }
    }
}
