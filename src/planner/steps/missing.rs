use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Step, StepOutcome};
use crate::config::DEFAULT_CLARIFICATION_LIMIT;
use crate::planner::dates::end_date;
use crate::planner::questions::{REQUIRED_FIELDS, questions_for};
use crate::planner::state::{StepName, TripState, TripStatus, TripUpdate};

/// Derives the end date when possible and lists required fields still absent.
///
/// Once `loop_limit` rounds of questions have been asked and fields are still
/// missing, this step ends the clarification loop: it fills in the questions
/// and marks the thread `needs_clarification` so the graph terminates.
pub struct CheckMissingInfo {
    loop_limit: u32,
}

impl CheckMissingInfo {
    pub fn new(loop_limit: u32) -> Self {
        Self { loop_limit }
    }
}

impl Default for CheckMissingInfo {
    fn default() -> Self {
        Self::new(DEFAULT_CLARIFICATION_LIMIT)
    }
}

/// Required fields that are absent or empty, in check order.
fn missing_fields(state: &TripState) -> Vec<String> {
    REQUIRED_FIELDS
        .iter()
        .filter(|field| match **field {
            "destination" => state.destination.as_deref().is_none_or(str::is_empty),
            "duration_days" => state.duration_days.is_none_or(|d| d == 0),
            "travel_start_date" => state.travel_start_date.is_none(),
            "travel_end_date" => state.travel_end_date.is_none(),
            _ => false,
        })
        .map(|field| field.to_string())
        .collect()
}

#[async_trait]
impl Step for CheckMissingInfo {
    fn name(&self) -> StepName {
        StepName::CheckMissingInfo
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        let mut update = TripUpdate::for_step(self.name());
        let mut view = state.clone();

        if state.travel_end_date.is_none() {
            if let (Some(start), Some(days)) = (state.travel_start_date, state.duration_days) {
                if let Some(end) = end_date(start, days) {
                    debug!(%start, days, %end, "Derived travel end date");
                    update.travel_end_date = Some(end);
                    view.travel_end_date = Some(end);
                }
            }
        }

        let missing = missing_fields(&view);
        update.has_missing_info = Some(!missing.is_empty());

        if !missing.is_empty() && state.clarification_loop_count >= self.loop_limit {
            warn!(
                missing = ?missing,
                loop_count = state.clarification_loop_count,
                limit = self.loop_limit,
                "Clarification limit reached; stopping with fields still missing"
            );
            let questions = state
                .clarifying_questions
                .clone()
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| questions_for(&missing));
            update.clarifying_questions = Some(questions);
            update.status = Some(TripStatus::NeedsClarification);
        }

        update.missing_info = missing;
        StepOutcome::Update(update)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    async fn run(step: &CheckMissingInfo, state: &TripState) -> TripUpdate {
        match step.execute(state).await {
            StepOutcome::Update(update) => update,
            StepOutcome::Suspend(_) => panic!("check never suspends"),
        }
    }

    #[tokio::test]
    async fn lists_missing_fields_in_order() {
        let state = TripState {
            destination: Some("Paris".into()),
            duration_days: Some(5),
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::default(), &state).await;
        assert_eq!(update.missing_info, vec!["travel_start_date", "travel_end_date"]);
        assert_eq!(update.has_missing_info, Some(true));
        assert!(update.status.is_none());
        assert!(update.clarifying_questions.is_none());
    }

    #[tokio::test]
    async fn derives_end_date_inclusively() {
        let state = TripState {
            destination: Some("Paris".into()),
            duration_days: Some(5),
            travel_start_date: date(2024, 6, 1),
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::default(), &state).await;
        assert_eq!(update.travel_end_date, date(2024, 6, 5));
        assert!(update.missing_info.is_empty());
        assert_eq!(update.has_missing_info, Some(false));
    }

    #[tokio::test]
    async fn explicit_end_date_is_never_changed() {
        let mut state = TripState {
            destination: Some("Paris".into()),
            duration_days: Some(5),
            travel_start_date: date(2024, 6, 1),
            travel_end_date: date(2024, 6, 20),
            ..Default::default()
        };
        for _ in 0..3 {
            let update = run(&CheckMissingInfo::default(), &state).await;
            assert!(update.travel_end_date.is_none());
            state.apply(update);
            assert_eq!(state.travel_end_date, date(2024, 6, 20));
        }
    }

    #[tokio::test]
    async fn empty_values_count_as_missing() {
        let state = TripState {
            destination: Some(String::new()),
            duration_days: Some(0),
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::default(), &state).await;
        assert_eq!(update.missing_info.len(), 4);
    }

    #[tokio::test]
    async fn forced_stop_at_loop_limit() {
        let state = TripState {
            destination: Some("Paris".into()),
            clarification_loop_count: 2,
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::new(2), &state).await;
        assert_eq!(update.status, Some(TripStatus::NeedsClarification));
        let questions = update.clarifying_questions.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0], "How many days will your trip be?");
    }

    #[tokio::test]
    async fn forced_stop_keeps_existing_questions() {
        let state = TripState {
            clarification_loop_count: 3,
            clarifying_questions: Some(vec!["Where to?".into()]),
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::new(2), &state).await;
        assert_eq!(update.clarifying_questions.unwrap(), vec!["Where to?"]);
    }

    #[tokio::test]
    async fn complete_state_at_limit_is_not_forced() {
        let state = TripState {
            destination: Some("Paris".into()),
            duration_days: Some(2),
            travel_start_date: date(2024, 6, 1),
            clarification_loop_count: 5,
            ..Default::default()
        };
        let update = run(&CheckMissingInfo::new(2), &state).await;
        assert!(update.status.is_none());
        assert_eq!(update.has_missing_info, Some(false));
    }
}
