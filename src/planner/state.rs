//! Trip state threaded through every workflow step, and its merge rules.
//!
//! Scalars use replace semantics: a `Some` in a [`TripUpdate`] overwrites the
//! state. The list fields `preferences`, `accommodation_amenities`,
//! `transport_preferences`, `additional_requirements`, `missing_info` and
//! `errors` accumulate instead.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder used in prompts for absent scalar fields.
pub const NOT_SPECIFIED: &str = "not specified";

/// Placeholder used in prompts for empty list fields.
pub const NONE_SPECIFIED: &str = "none specified";

/// Free-text answers to clarifying questions, keyed by field name.
pub type UserResponses = BTreeMap<String, String>;

/// Identifies a step in the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    ExtractRequirements,
    CheckMissingInfo,
    AskClarifyingQuestions,
    IdentifyAttractions,
    IdentifyAttractionsAndPlan,
    GenerateDayWisePlan,
    OptimizeAndFormatFinalPlan,
}

impl StepName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractRequirements => "extract_requirements",
            Self::CheckMissingInfo => "check_missing_info",
            Self::AskClarifyingQuestions => "ask_clarifying_questions",
            Self::IdentifyAttractions => "identify_attractions",
            Self::IdentifyAttractionsAndPlan => "identify_attractions_and_plan",
            Self::GenerateDayWisePlan => "generate_day_wise_plan",
            Self::OptimizeAndFormatFinalPlan => "optimize_and_format_final_plan",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall status of a planning thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    InProgress,
    NeedsClarification,
    Completed,
    Error,
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::NeedsClarification => "needs_clarification",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Latest merged snapshot of one conversation thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripState {
    pub user_input: Option<String>,

    pub destination: Option<String>,
    pub duration_days: Option<u32>,
    pub budget: Option<Decimal>,
    pub travel_start_date: Option<NaiveDate>,
    pub travel_end_date: Option<NaiveDate>,
    /// "HH:MM", 24-hour.
    pub daily_start_time: Option<String>,
    pub daily_end_time: Option<String>,
    pub group_size: Option<u32>,
    pub accommodation_type: Option<String>,

    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub accommodation_amenities: Vec<String>,
    #[serde(default)]
    pub transport_preferences: Vec<String>,
    #[serde(default)]
    pub additional_requirements: Vec<String>,

    pub extracted_requirements: Option<Map<String, Value>>,

    #[serde(default)]
    pub missing_info: Vec<String>,
    pub has_missing_info: Option<bool>,

    pub clarifying_questions: Option<Vec<String>>,
    pub user_responses: Option<UserResponses>,
    #[serde(default)]
    pub clarification_loop_count: u32,

    pub attractions: Option<Vec<Value>>,
    pub day_wise_plan: Option<Vec<Value>>,
    pub optimized_itinerary: Option<Vec<Value>>,
    pub final_plan: Option<String>,

    #[serde(default)]
    pub status: TripStatus,
    pub current_step: Option<StepName>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Partial update produced by a step.
///
/// `None` scalars leave the state untouched; list fields listed as
/// accumulating are appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripUpdate {
    pub user_input: Option<String>,
    pub destination: Option<String>,
    pub duration_days: Option<u32>,
    pub budget: Option<Decimal>,
    pub travel_start_date: Option<NaiveDate>,
    pub travel_end_date: Option<NaiveDate>,
    pub daily_start_time: Option<String>,
    pub daily_end_time: Option<String>,
    pub group_size: Option<u32>,
    pub accommodation_type: Option<String>,

    pub preferences: Vec<String>,
    pub accommodation_amenities: Vec<String>,
    pub transport_preferences: Vec<String>,
    pub additional_requirements: Vec<String>,

    pub extracted_requirements: Option<Map<String, Value>>,
    pub missing_info: Vec<String>,
    pub has_missing_info: Option<bool>,
    pub clarifying_questions: Option<Vec<String>>,
    pub user_responses: Option<UserResponses>,
    pub clarification_loop_count: Option<u32>,

    pub attractions: Option<Vec<Value>>,
    pub day_wise_plan: Option<Vec<Value>>,
    pub optimized_itinerary: Option<Vec<Value>>,
    pub final_plan: Option<String>,

    pub status: Option<TripStatus>,
    pub current_step: Option<StepName>,
    pub errors: Vec<String>,
}

impl TripUpdate {
    /// An update attributed to `step`.
    pub fn for_step(step: StepName) -> Self {
        Self {
            current_step: Some(step),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: TripStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Mark the update as failed and record a human-readable message.
    pub fn failed(mut self, message: impl Into<String>) -> Self {
        self.status = Some(TripStatus::Error);
        self.errors.push(message.into());
        self
    }
}

/// Append `incoming` to `target`, skipping entries already present.
fn append_distinct(target: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn replace<T>(target: &mut Option<T>, incoming: Option<T>) {
    if incoming.is_some() {
        *target = incoming;
    }
}

impl TripState {
    /// Fresh state for a new thread.
    pub fn new(user_input: Option<String>, user_responses: Option<UserResponses>) -> Self {
        Self {
            user_input,
            user_responses: user_responses.filter(|r| !r.is_empty()),
            ..Default::default()
        }
    }

    /// Merge a step's partial update into this snapshot.
    pub fn apply(&mut self, update: TripUpdate) {
        replace(&mut self.user_input, update.user_input);
        replace(&mut self.destination, update.destination);
        replace(&mut self.duration_days, update.duration_days);
        replace(&mut self.budget, update.budget);
        replace(&mut self.travel_start_date, update.travel_start_date);
        replace(&mut self.travel_end_date, update.travel_end_date);
        replace(&mut self.daily_start_time, update.daily_start_time);
        replace(&mut self.daily_end_time, update.daily_end_time);
        replace(&mut self.group_size, update.group_size);
        replace(&mut self.accommodation_type, update.accommodation_type);

        append_distinct(&mut self.preferences, update.preferences);
        append_distinct(
            &mut self.accommodation_amenities,
            update.accommodation_amenities,
        );
        append_distinct(&mut self.transport_preferences, update.transport_preferences);
        append_distinct(
            &mut self.additional_requirements,
            update.additional_requirements,
        );

        replace(&mut self.extracted_requirements, update.extracted_requirements);
        self.missing_info.extend(update.missing_info);
        replace(&mut self.has_missing_info, update.has_missing_info);
        replace(&mut self.clarifying_questions, update.clarifying_questions);
        replace(&mut self.user_responses, update.user_responses);
        if let Some(count) = update.clarification_loop_count {
            self.clarification_loop_count = count;
        }

        replace(&mut self.attractions, update.attractions);
        replace(&mut self.day_wise_plan, update.day_wise_plan);
        replace(&mut self.optimized_itinerary, update.optimized_itinerary);
        replace(&mut self.final_plan, update.final_plan);

        if let Some(status) = update.status {
            self.status = status;
        }
        replace(&mut self.current_step, update.current_step);
        self.errors.extend(update.errors);
    }

    /// Prepare a checkpointed snapshot for a resumed execution.
    ///
    /// `missing_info` is recomputed on every execution, so it starts empty.
    pub fn begin_resumed_execution(&mut self) {
        self.missing_info.clear();
    }

    // ── Prompt accessors ────────────────────────────────────────────

    pub fn destination_label(&self) -> &str {
        self.destination.as_deref().unwrap_or("Unknown")
    }

    pub fn duration_label(&self) -> String {
        self.duration_days
            .map(|d| d.to_string())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    }

    pub fn start_date_label(&self) -> String {
        date_label(self.travel_start_date)
    }

    pub fn end_date_label(&self) -> String {
        date_label(self.travel_end_date)
    }

    pub fn travel_dates_label(&self) -> String {
        match (self.travel_start_date, self.travel_end_date) {
            (Some(start), Some(end)) => format!("{start} to {end}"),
            (Some(start), None) => format!("from {start}"),
            (None, Some(end)) => format!("until {end}"),
            (None, None) => NOT_SPECIFIED.to_string(),
        }
    }

    pub fn daily_start_label(&self) -> &str {
        self.daily_start_time.as_deref().unwrap_or(NOT_SPECIFIED)
    }

    pub fn daily_end_label(&self) -> &str {
        self.daily_end_time.as_deref().unwrap_or(NOT_SPECIFIED)
    }

    pub fn group_size_label(&self) -> String {
        self.group_size
            .map(|g| g.to_string())
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    }

    pub fn accommodation_label(&self) -> &str {
        self.accommodation_type.as_deref().unwrap_or(NOT_SPECIFIED)
    }

    pub fn budget_label(&self) -> String {
        self.budget
            .map(format_currency)
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    }

    pub fn preferences_label(&self) -> String {
        list_label(&self.preferences)
    }
}

fn date_label(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Comma-joined list, or the "none specified" placeholder.
pub fn list_label(items: &[String]) -> String {
    if items.is_empty() {
        NONE_SPECIFIED.to_string()
    } else {
        items.join(", ")
    }
}

/// Render an amount as `$1,234.50`.
pub fn format_currency(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scalars_replace_only_when_present() {
        let mut state = TripState {
            destination: Some("Paris".into()),
            duration_days: Some(5),
            ..Default::default()
        };
        state.apply(TripUpdate {
            duration_days: Some(7),
            ..Default::default()
        });
        assert_eq!(state.destination.as_deref(), Some("Paris"));
        assert_eq!(state.duration_days, Some(7));
    }

    #[test]
    fn accumulating_fields_append() {
        let mut state = TripState::default();
        state.apply(TripUpdate {
            preferences: vec!["museums".into()],
            errors: vec!["first".into()],
            missing_info: vec!["destination".into()],
            ..Default::default()
        });
        state.apply(TripUpdate {
            preferences: vec!["food".into(), "museums".into()],
            errors: vec!["second".into()],
            missing_info: vec!["duration_days".into()],
            ..Default::default()
        });
        assert_eq!(state.preferences, vec!["museums", "food"]);
        assert_eq!(state.errors, vec!["first", "second"]);
        assert_eq!(state.missing_info, vec!["destination", "duration_days"]);
    }

    #[test]
    fn earlier_snapshot_is_prefix_of_later() {
        let mut state = TripState::default();
        state.apply(TripUpdate::for_step(StepName::ExtractRequirements).failed("boom"));
        let before = state.clone();
        state.apply(TripUpdate::for_step(StepName::CheckMissingInfo).failed("again"));
        assert!(state.errors.starts_with(&before.errors));
        assert!(state.preferences.starts_with(&before.preferences));
        assert!(state.missing_info.starts_with(&before.missing_info));
    }

    #[test]
    fn failed_sets_error_status_and_message() {
        let update = TripUpdate::for_step(StepName::GenerateDayWisePlan).failed("no attractions");
        assert_eq!(update.status, Some(TripStatus::Error));
        assert_eq!(update.errors, vec!["no attractions"]);
        assert_eq!(update.current_step, Some(StepName::GenerateDayWisePlan));
    }

    #[test]
    fn new_state_drops_empty_responses() {
        let state = TripState::new(Some("Paris".into()), Some(UserResponses::new()));
        assert!(state.user_responses.is_none());
        assert_eq!(state.status, TripStatus::InProgress);
        assert_eq!(state.clarification_loop_count, 0);
    }

    #[test]
    fn resumed_execution_clears_missing_info_only() {
        let mut state = TripState {
            missing_info: vec!["travel_start_date".into()],
            errors: vec!["kept".into()],
            clarification_loop_count: 1,
            ..Default::default()
        };
        state.begin_resumed_execution();
        assert!(state.missing_info.is_empty());
        assert_eq!(state.errors, vec!["kept"]);
        assert_eq!(state.clarification_loop_count, 1);
    }

    #[test]
    fn labels_fall_back_to_placeholders() {
        let state = TripState::default();
        assert_eq!(state.duration_label(), NOT_SPECIFIED);
        assert_eq!(state.budget_label(), NOT_SPECIFIED);
        assert_eq!(state.preferences_label(), NONE_SPECIFIED);
        assert_eq!(state.accommodation_label(), NOT_SPECIFIED);
        assert_eq!(state.travel_dates_label(), NOT_SPECIFIED);
        assert_eq!(state.destination_label(), "Unknown");
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(dec!(2000)), "$2,000.00");
        assert_eq!(format_currency(dec!(1234567.5)), "$1,234,567.50");
        assert_eq!(format_currency(dec!(999.999)), "$1,000.00");
        assert_eq!(format_currency(dec!(42)), "$42.00");
        assert_eq!(format_currency(dec!(-1500)), "-$1,500.00");
    }

    #[test]
    fn status_display_matches_serde() {
        for status in [
            TripStatus::InProgress,
            TripStatus::NeedsClarification,
            TripStatus::Completed,
            TripStatus::Error,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
        }
    }

    #[test]
    fn step_name_display_matches_serde() {
        let step = StepName::AskClarifyingQuestions;
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, format!("\"{step}\""));
    }

    #[test]
    fn state_serde_roundtrip() {
        let state = TripState {
            destination: Some("Lisbon".into()),
            budget: Some(dec!(1500.50)),
            travel_start_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            preferences: vec!["food".into()],
            status: TripStatus::NeedsClarification,
            current_step: Some(StepName::AskClarifyingQuestions),
            ..Default::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let parsed: TripState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
        assert!(json.contains("\"2024-06-01\""));
    }
}
