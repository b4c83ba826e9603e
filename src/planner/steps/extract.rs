use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::{ModelClient, Step, StepOutcome, shape_error};
use crate::error::StepError;
use crate::planner::dates::{end_date, inclusive_duration, parse_date, start_date};
use crate::planner::prompts::{
    EXTRACT_REQUIREMENTS_PROMPT, extraction_input, extraction_user_prompt,
};
use crate::planner::state::{StepName, TripState, TripStatus, TripUpdate};

/// Turns free text plus any clarification answers into structured fields.
pub struct ExtractRequirements {
    model: ModelClient,
}

impl ExtractRequirements {
    pub fn new(model: ModelClient) -> Self {
        Self { model }
    }

    async fn extract(&self, state: &TripState, combined: String) -> Result<TripUpdate, StepError> {
        let value = self
            .model
            .complete_json(EXTRACT_REQUIREMENTS_PROMPT, extraction_user_prompt(&combined))
            .await?;
        let Value::Object(extracted) = value else {
            return Err(shape_error("a JSON object of requirements"));
        };

        let mut update = requirements_update(&extracted);
        derive_missing_date_field(state, &mut update);
        update.extracted_requirements = Some(extracted);
        Ok(update)
    }
}

#[async_trait]
impl Step for ExtractRequirements {
    fn name(&self) -> StepName {
        StepName::ExtractRequirements
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        let Some(combined) =
            extraction_input(state.user_input.as_deref(), state.user_responses.as_ref())
        else {
            warn!("Extraction skipped: no input or responses");
            return StepOutcome::Update(TripUpdate {
                extracted_requirements: Some(Map::new()),
                ..TripUpdate::for_step(self.name()).failed(StepError::MissingInput.to_string())
            });
        };

        match self.extract(state, combined).await {
            Ok(update) => {
                debug!(
                    fields = update.extracted_requirements.as_ref().map_or(0, Map::len),
                    "Requirements extracted"
                );
                StepOutcome::Update(TripUpdate {
                    current_step: Some(self.name()),
                    ..update
                })
            }
            Err(e) => {
                error!(error = %e, "Error extracting requirements");
                StepOutcome::Update(TripUpdate {
                    extracted_requirements: Some(Map::new()),
                    ..TripUpdate::for_step(self.name())
                        .failed(format!("Error extracting requirements: {e}"))
                })
            }
        }
    }
}

/// Map recognized, non-null fields of the model's reply onto an update.
fn requirements_update(extracted: &Map<String, Value>) -> TripUpdate {
    let field = |key: &str| extracted.get(key).filter(|v| !v.is_null());
    let either = |key: &str, alias: &str| field(key).or_else(|| field(alias));

    TripUpdate {
        destination: field("destination").and_then(as_text),
        duration_days: field("duration_days").and_then(as_count),
        budget: field("budget").and_then(as_amount),
        travel_start_date: field("travel_start_date").and_then(|v| as_date("travel_start_date", v)),
        travel_end_date: field("travel_end_date").and_then(|v| as_date("travel_end_date", v)),
        daily_start_time: either("daily_start_time", "daily_itinerary_start_time").and_then(as_text),
        daily_end_time: either("daily_end_time", "daily_itinerary_end_time").and_then(as_text),
        group_size: field("group_size").and_then(as_count),
        accommodation_type: field("accommodation_type").and_then(as_text),
        preferences: field("preferences").map(as_list).unwrap_or_default(),
        accommodation_amenities: field("accommodation_amenities")
            .map(as_list)
            .unwrap_or_default(),
        transport_preferences: field("transport_preferences")
            .map(as_list)
            .unwrap_or_default(),
        additional_requirements: field("additional_requirements")
            .map(as_list)
            .unwrap_or_default(),
        status: Some(TripStatus::InProgress),
        ..Default::default()
    }
}

/// When exactly two of duration/start/end are known, fill in the third.
///
/// Values already on the state count as known and are never replaced.
fn derive_missing_date_field(state: &TripState, update: &mut TripUpdate) {
    let duration = update.duration_days.or(state.duration_days);
    let start = update.travel_start_date.or(state.travel_start_date);
    let end = update.travel_end_date.or(state.travel_end_date);

    match (duration, start, end) {
        (Some(days), Some(start), None) => update.travel_end_date = end_date(start, days),
        (Some(days), None, Some(end)) => update.travel_start_date = start_date(end, days),
        (None, Some(start), Some(end)) => update.duration_days = inclusive_duration(start, end),
        _ => {}
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts `5`, `5.0` and `"5"`.
fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts numbers and strings such as `"$2,000"`.
fn as_amount(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s
            .chars()
            .filter(|c| !matches!(c, '$' | ',' | ' '))
            .collect(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn as_date(key: &str, value: &Value) -> Option<chrono::NaiveDate> {
    let text = value.as_str()?;
    let parsed = parse_date(text);
    if parsed.is_none() {
        warn!(field = key, value = text, "Ignoring unparseable date");
    }
    parsed
}

/// Lists pass through; a bare scalar becomes a one-element list.
fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        other => as_text(other).into_iter().collect(),
    }
}
