//! Workflow graph: step registry, routing and the suspend/resume driver.
//!
//! ```text
//! extract ──error──▶ END
//!    │
//!    ▼
//! check ──limit reached──▶ END
//!    │ missing            │ complete
//!    ▼                    ▼
//! ask ─(suspend)─▶ extract   plan ─▶ optimize ─▶ END
//! ```
//!
//! `plan` is a single fused step or attractions followed by the day plan,
//! depending on [`PlanningMode`]. A run returns [`RunOutcome`]: either the
//! finished state or the suspension payload for the caller to answer.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{GraphOptions, PlanningMode};
use crate::error::GraphError;
use crate::llm::provider::LlmProvider;
use crate::planner::checkpoint::{Checkpoint, CheckpointStore};
use crate::planner::state::{StepName, TripState, TripStatus, UserResponses};
use crate::planner::steps::{
    AskClarifyingQuestions, CheckMissingInfo, ExtractRequirements, GenerateDayWisePlan,
    IdentifyAttractions, IdentifyAttractionsAndPlan, ModelClient, OptimizeAndFormatFinalPlan, Step,
    StepOutcome, SuspendPayload,
};

/// Result of driving the graph until it ends or suspends.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished(TripState),
    Suspended {
        state: TripState,
        payload: SuspendPayload,
        checkpoint_id: Uuid,
    },
}

impl RunOutcome {
    pub fn state(&self) -> &TripState {
        match self {
            Self::Finished(state) | Self::Suspended { state, .. } => state,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    Step(StepName),
    End,
}

/// Assembles a [`TripGraph`] from its collaborators.
pub struct TripGraphBuilder {
    llm: Arc<dyn LlmProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    options: GraphOptions,
}

impl TripGraphBuilder {
    pub fn new(llm: Arc<dyn LlmProvider>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self {
            llm,
            checkpoints,
            options: GraphOptions::default(),
        }
    }

    pub fn options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self
    }

    pub fn planning_mode(mut self, mode: PlanningMode) -> Self {
        self.options.planning_mode = mode;
        self
    }

    pub fn build(self) -> TripGraph {
        let model = ModelClient::new(self.llm, self.options.temperature);

        let mut steps: Vec<Arc<dyn Step>> = vec![
            Arc::new(ExtractRequirements::new(model.clone())),
            Arc::new(CheckMissingInfo::new(self.options.loop_limit)),
            Arc::new(AskClarifyingQuestions),
        ];
        match self.options.planning_mode {
            PlanningMode::Fused => {
                steps.push(Arc::new(IdentifyAttractionsAndPlan::new(model.clone())));
            }
            PlanningMode::Separate => {
                steps.push(Arc::new(IdentifyAttractions::new(model.clone())));
                steps.push(Arc::new(GenerateDayWisePlan::new(model.clone())));
            }
        }
        steps.push(Arc::new(OptimizeAndFormatFinalPlan::new(model)));

        TripGraph {
            steps: steps.into_iter().map(|s| (s.name(), s)).collect(),
            checkpoints: self.checkpoints,
            options: self.options,
        }
    }
}

/// Immutable, compiled planning workflow.
pub struct TripGraph {
    steps: HashMap<StepName, Arc<dyn Step>>,
    checkpoints: Arc<dyn CheckpointStore>,
    options: GraphOptions,
}

impl TripGraph {
    pub const ENTRY: StepName = StepName::ExtractRequirements;

    /// Latest checkpoint for a thread, if any.
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<Checkpoint>, GraphError> {
        Ok(self.checkpoints.load(thread_id).await?)
    }

    /// Drop a thread's checkpoint. Returns whether one existed.
    pub async fn discard(&self, thread_id: &str) -> Result<bool, GraphError> {
        let removed = self.checkpoints.delete(thread_id).await?;
        if removed {
            info!(thread_id, "Checkpoint discarded");
        }
        Ok(removed)
    }

    /// Run a fresh thread from the entry step.
    pub async fn start(&self, thread_id: &str, state: TripState) -> Result<RunOutcome, GraphError> {
        let span = info_span!("trip_graph", thread_id = %thread_id, mode = "start");
        self.drive(thread_id, state, Next::Step(Self::ENTRY))
            .instrument(span)
            .await
    }

    /// Resume a suspended thread with the caller's answers.
    ///
    /// Fails with [`GraphError::NotSuspended`] when the thread has no
    /// checkpoint or its last run terminated.
    pub async fn resume(
        &self,
        thread_id: &str,
        responses: UserResponses,
    ) -> Result<RunOutcome, GraphError> {
        let span = info_span!("trip_graph", thread_id = %thread_id, mode = "resume");
        self.resume_inner(thread_id, responses).instrument(span).await
    }

    async fn resume_inner(
        &self,
        thread_id: &str,
        responses: UserResponses,
    ) -> Result<RunOutcome, GraphError> {
        let not_suspended = || GraphError::NotSuspended {
            thread_id: thread_id.to_string(),
        };
        let checkpoint = self
            .checkpoints
            .load(thread_id)
            .await?
            .ok_or_else(not_suspended)?;
        let (Some(step_name), Some(payload)) = (checkpoint.resume_at, checkpoint.pending) else {
            return Err(not_suspended());
        };

        let step = self.step(step_name)?;
        let mut state = checkpoint.state;
        state.begin_resumed_execution();
        state.apply(step.on_resume(&state, &payload, responses));
        info!(
            step = %step_name,
            loop_count = state.clarification_loop_count,
            "Resuming thread"
        );

        let next = self.route(step_name, &state);
        self.drive(thread_id, state, next).await
    }

    fn step(&self, name: StepName) -> Result<&Arc<dyn Step>, GraphError> {
        self.steps.get(&name).ok_or_else(|| GraphError::UnknownStep {
            step: name.to_string(),
        })
    }

    fn planning_entry(&self) -> StepName {
        match self.options.planning_mode {
            PlanningMode::Fused => StepName::IdentifyAttractionsAndPlan,
            PlanningMode::Separate => StepName::IdentifyAttractions,
        }
    }

    /// Edge from `from`, given the state after its update was merged.
    fn route(&self, from: StepName, state: &TripState) -> Next {
        match from {
            StepName::ExtractRequirements => {
                if state.status == TripStatus::Error {
                    Next::End
                } else {
                    Next::Step(StepName::CheckMissingInfo)
                }
            }
            StepName::CheckMissingInfo => {
                let missing = state.has_missing_info.unwrap_or(false);
                if missing && state.clarification_loop_count >= self.options.loop_limit {
                    Next::End
                } else if missing {
                    Next::Step(StepName::AskClarifyingQuestions)
                } else {
                    Next::Step(self.planning_entry())
                }
            }
            StepName::AskClarifyingQuestions => Next::Step(StepName::ExtractRequirements),
            StepName::IdentifyAttractions => Next::Step(StepName::GenerateDayWisePlan),
            StepName::IdentifyAttractionsAndPlan | StepName::GenerateDayWisePlan => {
                Next::Step(StepName::OptimizeAndFormatFinalPlan)
            }
            StepName::OptimizeAndFormatFinalPlan => Next::End,
        }
    }

    async fn drive(
        &self,
        thread_id: &str,
        mut state: TripState,
        mut next: Next,
    ) -> Result<RunOutcome, GraphError> {
        let limit = self.options.recursion_limit;
        let mut executed = 0usize;

        while let Next::Step(name) = next {
            if executed >= limit {
                error!(limit, step = %name, "Recursion limit reached");
                return Err(GraphError::RecursionLimit { limit });
            }
            executed += 1;

            let step = self.step(name)?;
            info!(thread_id, step = %name, "Running step");

            match step.execute(&state).await {
                StepOutcome::Update(update) => {
                    let errors_before = state.errors.len();
                    state.apply(update);
                    for message in &state.errors[errors_before..] {
                        warn!(thread_id, step = %name, error = %message, "Step reported an error");
                    }
                    next = self.route(name, &state);
                }
                StepOutcome::Suspend(payload) => {
                    let checkpoint =
                        Checkpoint::suspended(thread_id, state.clone(), name, payload.clone());
                    self.checkpoints.save(&checkpoint).await?;
                    info!(
                        thread_id,
                        step = %name,
                        checkpoint_id = %checkpoint.checkpoint_id,
                        "Thread suspended"
                    );
                    return Ok(RunOutcome::Suspended {
                        state,
                        payload,
                        checkpoint_id: checkpoint.checkpoint_id,
                    });
                }
            }
        }

        self.checkpoints
            .save(&Checkpoint::terminal(thread_id, state.clone()))
            .await?;
        info!(thread_id, status = %state.status, steps = executed, "Thread finished");
        Ok(RunOutcome::Finished(state))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::planner::checkpoint::MemoryCheckpointStore;
    use crate::planner::steps::test_support::ScriptedLlm;

    const PARIS: &str = r#"{"destination": "Paris", "duration_days": 5, "budget": 2000}"#;
    const PARIS_WITH_START: &str =
        r#"{"destination": "Paris", "duration_days": 5, "budget": 2000, "travel_start_date": "2024-06-01"}"#;
    const FUSED_PLAN: &str = r#"{
        "attractions": [{"name": "Louvre"}],
        "day_wise_plan": [{"day": 1, "theme": "Art", "activities": [{"time": "09:00", "activity": "Louvre"}]}]
    }"#;

    fn graph(llm: Arc<ScriptedLlm>, store: Arc<MemoryCheckpointStore>) -> TripGraph {
        TripGraphBuilder::new(llm, store).build()
    }

    fn input(text: &str) -> TripState {
        TripState::new(Some(text.to_string()), None)
    }

    fn responses(pairs: &[(&str, &str)]) -> UserResponses {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn suspends_when_dates_missing() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(PARIS)]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm.clone(), store.clone());

        let outcome = graph.start("t1", input("5 days in Paris")).await.unwrap();
        let RunOutcome::Suspended { state, payload, checkpoint_id } = outcome else {
            panic!("expected suspension");
        };
        assert_eq!(payload.missing_fields, vec!["travel_start_date", "travel_end_date"]);
        assert_eq!(payload.clarification_loop_count, 1);
        assert_eq!(state.clarification_loop_count, 0);
        assert_eq!(llm.calls(), 1);

        let saved = store.load("t1").await.unwrap().unwrap();
        assert_eq!(saved.checkpoint_id, checkpoint_id);
        assert_eq!(saved.resume_at, Some(StepName::AskClarifyingQuestions));
    }

    #[tokio::test]
    async fn resume_reextracts_and_completes() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(PARIS),
            Ok(PARIS_WITH_START),
            Ok(FUSED_PLAN),
            Ok("Your Paris plan"),
        ]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm.clone(), store.clone());

        graph.start("t1", input("5 days in Paris")).await.unwrap();
        let outcome = graph
            .resume("t1", responses(&[("travel_start_date", "2024-06-01")]))
            .await
            .unwrap();

        let RunOutcome::Finished(state) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(state.status, TripStatus::Completed);
        assert_eq!(state.travel_end_date, NaiveDate::from_ymd_opt(2024, 6, 5));
        assert!(state.missing_info.is_empty());
        assert_eq!(state.has_missing_info, Some(false));
        assert_eq!(state.clarification_loop_count, 1);
        assert_eq!(state.final_plan.as_deref(), Some("Your Paris plan"));
        assert_eq!(llm.calls(), 4);

        let saved = store.load("t1").await.unwrap().unwrap();
        assert!(!saved.is_suspended());
    }

    #[tokio::test]
    async fn loop_limit_forces_stop() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(PARIS), Ok(PARIS), Ok(PARIS)]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm.clone(), store);

        assert!(graph.start("t1", input("Paris")).await.unwrap().is_suspended());
        let second = graph.resume("t1", responses(&[("x", "y")])).await.unwrap();
        let RunOutcome::Suspended { payload, .. } = second else {
            panic!("expected a second round of questions");
        };
        assert_eq!(payload.clarification_loop_count, 2);

        let third = graph.resume("t1", responses(&[("x", "z")])).await.unwrap();
        let RunOutcome::Finished(state) = third else {
            panic!("forced stop must not suspend again");
        };
        assert_eq!(state.status, TripStatus::NeedsClarification);
        assert_eq!(state.clarifying_questions.as_ref().map(Vec::len), Some(2));
        assert_eq!(state.current_step, Some(StepName::CheckMissingInfo));
        assert_eq!(llm.calls(), 3);

        let err = graph.resume("t1", responses(&[("x", "z")])).await.unwrap_err();
        assert!(matches!(err, GraphError::NotSuspended { .. }));
    }

    #[tokio::test]
    async fn extraction_error_ends_graph() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("not json")]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm.clone(), store.clone());

        let outcome = graph.start("t1", input("Paris")).await.unwrap();
        let state = outcome.state();
        assert_eq!(state.status, TripStatus::Error);
        assert_eq!(state.current_step, Some(StepName::ExtractRequirements));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(llm.calls(), 1);
        assert!(store.load("t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn separate_planning_runs_two_calls() {
        let complete = r#"{"destination": "Rome", "duration_days": 1, "travel_start_date": "2024-06-01"}"#;
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok(complete),
            Ok(r#"[{"name": "Colosseum"}]"#),
            Ok(r#"[{"day": 1, "theme": "Ancient", "activities": []}]"#),
            Ok("Rome plan"),
        ]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = TripGraphBuilder::new(llm.clone(), store)
            .planning_mode(PlanningMode::Separate)
            .build();

        let outcome = graph.start("t1", input("A day in Rome")).await.unwrap();
        let state = outcome.state();
        assert_eq!(state.status, TripStatus::Completed);
        assert_eq!(state.attractions.as_ref().map(Vec::len), Some(1));
        assert_eq!(state.optimized_itinerary.as_ref().map(Vec::len), Some(1));
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn failed_planning_still_reaches_final_step() {
        let complete = r#"{"destination": "Rome", "duration_days": 1, "travel_start_date": "2024-06-01"}"#;
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(complete), Err("overloaded")]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm.clone(), store);

        let outcome = graph.start("t1", input("A day in Rome")).await.unwrap();
        let state = outcome.state();
        assert_eq!(state.status, TripStatus::Error);
        assert_eq!(
            state.final_plan.as_deref(),
            Some("Unable to generate final plan - no day-wise plan available.")
        );
        assert_eq!(state.current_step, Some(StepName::OptimizeAndFormatFinalPlan));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn recursion_limit_is_enforced() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(PARIS)]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = TripGraphBuilder::new(llm, store)
            .options(GraphOptions {
                recursion_limit: 1,
                ..GraphOptions::default()
            })
            .build();

        let err = graph.start("t1", input("Paris")).await.unwrap_err();
        assert!(matches!(err, GraphError::RecursionLimit { limit: 1 }));
    }

    #[tokio::test]
    async fn resume_unknown_thread() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = graph(llm, store);

        let err = graph.resume("ghost", UserResponses::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::NotSuspended { ref thread_id } if thread_id == "ghost"));
    }

    #[test]
    fn routing_after_check() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let graph = graph(llm, Arc::new(MemoryCheckpointStore::new()));

        let mut state = TripState {
            has_missing_info: Some(true),
            ..Default::default()
        };
        assert_eq!(
            graph.route(StepName::CheckMissingInfo, &state),
            Next::Step(StepName::AskClarifyingQuestions)
        );
        state.clarification_loop_count = 2;
        assert_eq!(graph.route(StepName::CheckMissingInfo, &state), Next::End);
        state.has_missing_info = Some(false);
        assert_eq!(
            graph.route(StepName::CheckMissingInfo, &state),
            Next::Step(StepName::IdentifyAttractionsAndPlan)
        );
    }
}
