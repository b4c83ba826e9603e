use async_trait::async_trait;
use tracing::info;

use super::{Step, StepOutcome, SuspendPayload};
use crate::planner::questions::questions_for;
use crate::planner::state::{StepName, TripState, TripStatus, TripUpdate, UserResponses};

/// The workflow's only suspend point: asks one question per missing field.
pub struct AskClarifyingQuestions;

#[async_trait]
impl Step for AskClarifyingQuestions {
    fn name(&self) -> StepName {
        StepName::AskClarifyingQuestions
    }

    async fn execute(&self, state: &TripState) -> StepOutcome {
        if state.missing_info.is_empty() {
            return StepOutcome::Update(
                TripUpdate::for_step(self.name()).with_status(TripStatus::InProgress),
            );
        }

        let questions = questions_for(&state.missing_info);
        let loop_count = state.clarification_loop_count + 1;
        info!(
            missing = ?state.missing_info,
            loop_count,
            "Suspending for clarification"
        );

        StepOutcome::Suspend(SuspendPayload {
            clarifying_questions: questions,
            missing_fields: state.missing_info.clone(),
            clarification_loop_count: loop_count,
            current_step: self.name(),
            status: TripStatus::NeedsClarification,
        })
    }

    fn on_resume(
        &self,
        _state: &TripState,
        payload: &SuspendPayload,
        responses: UserResponses,
    ) -> TripUpdate {
        TripUpdate {
            user_responses: Some(responses),
            clarification_loop_count: Some(payload.clarification_loop_count),
            ..TripUpdate::for_step(self.name()).with_status(TripStatus::InProgress)
        }
    }
}
