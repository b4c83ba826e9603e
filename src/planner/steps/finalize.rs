use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use super::{ModelClient, Step, StepOutcome};
use crate::error::StepError;
use crate::planner::prompts::{OPTIMIZE_AND_FORMAT_PROMPT, optimize_user_prompt};
use crate::planner::state::{StepName, TripState, TripStatus, TripUpdate};

/// Final plan text when there is no day plan to format.
pub const UNABLE_TO_PLAN_MESSAGE: &str =
    "Unable to generate final plan - no day-wise plan available.";

/// Has the model polish the day plan into readable text.
///
/// If the model call fails, the plan is rendered locally instead so the
/// caller always gets text once a day plan exists.
pub struct OptimizeAndFormatFinalPlan {
    model: ModelClient,
}

impl OptimizeAndFormatFinalPlan {
    pub fn new(model: ModelClient) -> Self {
        Self { model }
    }

    async fn format(&self, state: &TripState, day_plan: &[Value]) -> Result<String, StepError> {
        let itinerary = serde_json::to_string(day_plan)?;
        self.model
            .complete_text(OPTIMIZE_AND_FORMAT_PROMPT, optimize_user_prompt(state, &itinerary))
            .await
    }
}

#[async_trait]
impl Step for OptimizeAndFormatFinalPlan {
    fn name(&self) -> StepName {
        StepName::OptimizeAndFormatFinalPlan
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        let day_plan = match state.day_wise_plan.as_deref() {
            Some(plan) if !plan.is_empty() => plan,
            _ => {
                warn!("No day-wise plan to format");
                return StepOutcome::Update(TripUpdate {
                    final_plan: Some(UNABLE_TO_PLAN_MESSAGE.to_string()),
                    ..TripUpdate::for_step(self.name()).with_status(TripStatus::Error)
                });
            }
        };

        let update = match self.format(state, day_plan).await {
            Ok(text) => {
                info!(chars = text.len(), "Final plan formatted");
                TripUpdate {
                    final_plan: Some(text),
                    optimized_itinerary: Some(day_plan.to_vec()),
                    ..TripUpdate::for_step(self.name()).with_status(TripStatus::Completed)
                }
            }
            Err(e) => {
                error!(error = %e, "Error optimizing final plan; using local formatter");
                TripUpdate {
                    final_plan: Some(format_fallback_plan(state, day_plan)),
                    optimized_itinerary: Some(day_plan.to_vec()),
                    ..TripUpdate::for_step(self.name())
                        .failed(format!("Error optimizing and formatting final plan: {e}"))
                }
            }
        };
        StepOutcome::Update(update)
    }
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Render a day plan as plain text without any model help.
pub fn format_fallback_plan(state: &TripState, day_plan: &[Value]) -> String {
    let duration = state
        .duration_days
        .map(|d| d.to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let mut out = format!(
        "Trip Plan for {} ({duration} days)\n\n",
        state.destination_label()
    );

    for day in day_plan {
        let number = match day.get("day") {
            None | Some(Value::Null) => "?".to_string(),
            value => text_of(value),
        };
        let _ = writeln!(out, "Day {number}: {}", text_of(day.get("theme")));

        let activities = day.get("activities").and_then(Value::as_array);
        for activity in activities.into_iter().flatten() {
            let _ = writeln!(
                out,
                "  {}: {}",
                text_of(activity.get("time")),
                text_of(activity.get("activity"))
            );
        }
        out.push('\n');
    }
    out
}
