//! Workflow steps.
//!
//! Each step reads the current [`TripState`] and returns a partial
//! [`TripUpdate`], or asks the graph to suspend. Steps catch their own
//! failures: an error becomes `status = error` plus a message appended to
//! `errors`, never a propagated `Err`.

mod attractions;
mod clarify;
mod day_plan;
mod extract;
mod finalize;
mod missing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StepError;
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::planner::parser::parse_json_response;
use crate::planner::state::{StepName, TripState, TripStatus, TripUpdate, UserResponses};

pub use attractions::{IdentifyAttractions, IdentifyAttractionsAndPlan};
pub use clarify::AskClarifyingQuestions;
pub use day_plan::GenerateDayWisePlan;
pub use extract::ExtractRequirements;
pub use finalize::{OptimizeAndFormatFinalPlan, UNABLE_TO_PLAN_MESSAGE, format_fallback_plan};
pub use missing::CheckMissingInfo;

/// Payload exposed to the caller when the workflow suspends for input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendPayload {
    pub clarifying_questions: Vec<String>,
    pub missing_fields: Vec<String>,
    pub clarification_loop_count: u32,
    pub current_step: StepName,
    pub status: TripStatus,
}

/// What a step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Merge this update and follow the graph's edges.
    Update(TripUpdate),
    /// Halt here until the caller resumes with user responses.
    Suspend(SuspendPayload),
}

/// A single unit of work in the planning graph.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> StepName;

    async fn execute(&self, state: &TripState) -> StepOutcome;

    /// Update applied when a thread suspended at this step is resumed.
    fn on_resume(
        &self,
        _state: &TripState,
        _payload: &SuspendPayload,
        responses: UserResponses,
    ) -> TripUpdate {
        TripUpdate {
            user_responses: Some(responses),
            ..TripUpdate::for_step(self.name())
        }
    }
}

/// Shared handle for steps that call the completion service.
#[derive(Clone)]
pub struct ModelClient {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
}

impl ModelClient {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self { llm, temperature }
    }

    /// Send a system + user prompt pair and return the raw text.
    pub async fn complete_text(&self, system: &str, user: String) -> Result<String, StepError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(system),
            ChatMessage::user(user),
        ])
        .with_temperature(self.temperature);

        let response = self.llm.complete(request).await?;
        tracing::debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Completion received"
        );
        Ok(response.content)
    }

    /// Like [`complete_text`](Self::complete_text), decoding the reply as JSON.
    pub async fn complete_json(&self, system: &str, user: String) -> Result<Value, StepError> {
        let text = self.complete_text(system, user).await?;
        Ok(parse_json_response(&text)?)
    }
}

/// A decode error for JSON that parsed but has the wrong shape.
pub(crate) fn shape_error(expected: &str) -> StepError {
    StepError::Decode(<serde_json::Error as serde::de::Error>::custom(format!(
        "expected {expected}"
    )))
}

/// Take `value` as an array of items, or fail with a decode error.
pub(crate) fn expect_array(value: Value) -> Result<Vec<Value>, StepError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(shape_error("a JSON array")),
    }
}
