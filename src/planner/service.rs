//! Request/response surface over the workflow graph.
//!
//! A request with non-empty `user_responses` resumes its thread; anything
//! else starts a new one and must carry a trip description. Answers for a
//! thread that has already finished return its stored result unchanged.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PlannerConfig;
use crate::error::{GraphError, RequestError};
use crate::llm::create_provider;
use crate::planner::checkpoint::{CheckpointStore, LibSqlCheckpointStore, MemoryCheckpointStore};
use crate::planner::graph::{RunOutcome, TripGraph, TripGraphBuilder};
use crate::planner::state::{TripState, TripStatus, UserResponses};
use crate::planner::steps::SuspendPayload;
use crate::tools::{FlightSearch, SerperFlightSearch};

/// Inbound planning request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    pub user_input: Option<String>,
    pub user_responses: Option<UserResponses>,
    pub thread_id: Option<String>,
}

impl PlanRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: Some(user_input.into()),
            ..Default::default()
        }
    }

    /// Answers to the questions a suspended thread asked.
    pub fn answers(thread_id: impl Into<String>, responses: UserResponses) -> Self {
        Self {
            user_input: None,
            user_responses: Some(responses),
            thread_id: Some(thread_id.into()),
        }
    }
}

/// Outbound planning response. `thread_id` is always set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    pub thread_id: String,
    pub status: TripStatus,
    /// The thread is suspended and will resume with answers keyed by the
    /// fields in `missing_info`.
    #[serde(default)]
    pub awaiting_answers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// The optimized itinerary when present, else the day plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_wise_plan: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<rust_decimal::Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_requirements: Option<Map<String, Value>>,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarifying_questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attractions: Option<Vec<Value>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl PlanResponse {
    fn from_state(thread_id: String, state: TripState) -> Self {
        Self {
            thread_id,
            status: state.status,
            awaiting_answers: false,
            destination: state.destination,
            itinerary: state
                .optimized_itinerary
                .or_else(|| state.day_wise_plan.clone()),
            day_wise_plan: state.day_wise_plan,
            estimated_cost: state.budget,
            final_plan: state.final_plan,
            extracted_requirements: state.extracted_requirements,
            missing_info: state.missing_info,
            clarifying_questions: state.clarifying_questions,
            attractions: state.attractions,
            errors: state.errors,
        }
    }

    /// Lay the suspension payload over the raw state.
    fn suspended(thread_id: String, mut state: TripState, payload: SuspendPayload) -> Self {
        state.clarifying_questions = Some(payload.clarifying_questions);
        state.missing_info = payload.missing_fields;
        state.clarification_loop_count = payload.clarification_loop_count;
        state.current_step = Some(payload.current_step);
        state.status = TripStatus::NeedsClarification;
        Self {
            awaiting_answers: true,
            ..Self::from_state(thread_id, state)
        }
    }
}

/// Entry point used by front-ends.
pub struct TripPlanner {
    graph: TripGraph,
    flights: Option<Arc<dyn FlightSearch>>,
}

impl TripPlanner {
    pub fn new(graph: TripGraph) -> Self {
        Self {
            graph,
            flights: None,
        }
    }

    /// Wire the provider, checkpoint store and flight lookup named in `config`.
    pub async fn from_config(config: &PlannerConfig) -> crate::error::Result<Self> {
        let llm = create_provider(&config.llm)?;
        let checkpoints: Arc<dyn CheckpointStore> = match &config.db_path {
            Some(path) => Arc::new(LibSqlCheckpointStore::new_local(path).await?),
            None => Arc::new(MemoryCheckpointStore::new()),
        };
        let graph = TripGraphBuilder::new(llm, checkpoints)
            .options(config.graph)
            .build();

        let planner = Self::new(graph);
        Ok(match &config.serper_api_key {
            Some(key) => planner.with_flights(Arc::new(SerperFlightSearch::new(key.clone()))),
            None => planner,
        })
    }

    pub fn with_flights(mut self, flights: Arc<dyn FlightSearch>) -> Self {
        self.flights = Some(flights);
        self
    }

    pub fn flights_enabled(&self) -> bool {
        self.flights.is_some()
    }

    /// Forget a thread so its id can no longer be resumed.
    pub async fn discard(&self, thread_id: &str) -> Result<bool, RequestError> {
        Ok(self.graph.discard(thread_id).await?)
    }

    /// Start or resume a planning thread.
    pub async fn plan(&self, request: PlanRequest) -> Result<PlanResponse, RequestError> {
        let PlanRequest {
            user_input,
            user_responses,
            thread_id,
        } = request;
        let user_input = user_input.filter(|s| !s.trim().is_empty());
        let responses = user_responses.filter(|r| !r.is_empty());

        if user_input.is_none() && responses.is_none() {
            return Err(RequestError::EmptyInput);
        }

        let thread_id = thread_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let outcome = match responses {
            Some(responses) => match self.graph.resume(&thread_id, responses.clone()).await {
                Err(GraphError::NotSuspended { .. }) => {
                    match self.graph.checkpoint(&thread_id).await? {
                        Some(finished) => {
                            warn!(
                                %thread_id,
                                status = %finished.state.status,
                                "Thread already finished; ignoring answers"
                            );
                            RunOutcome::Finished(finished.state)
                        }
                        None => {
                            warn!(%thread_id, "Unknown thread; starting it with the answers given");
                            let state = TripState::new(user_input, Some(responses));
                            self.graph.start(&thread_id, state).await?
                        }
                    }
                }
                other => other?,
            },
            None => {
                info!(%thread_id, "Starting new planning thread");
                self.graph
                    .start(&thread_id, TripState::new(user_input, None))
                    .await?
            }
        };

        Ok(match outcome {
            RunOutcome::Finished(state) => PlanResponse::from_state(thread_id, state),
            RunOutcome::Suspended { state, payload, .. } => {
                PlanResponse::suspended(thread_id, state, payload)
            }
        })
    }

    /// Look up flight prices for a route.
    pub async fn flight_prices(
        &self,
        origin_country_code: &str,
        origin_city: &str,
        arrival_city: &str,
    ) -> Result<String, RequestError> {
        let flights = self.flights.as_ref().ok_or(RequestError::FlightsUnavailable)?;
        Ok(flights
            .search(origin_country_code, origin_city, arrival_city)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ToolError;
    use crate::planner::checkpoint::Checkpoint;
    use crate::planner::steps::test_support::ScriptedLlm;

    const PARIS: &str = r#"{"destination": "Paris", "duration_days": 5, "budget": 2000}"#;

    fn planner(script: Vec<Result<&str, &str>>) -> (TripPlanner, Arc<MemoryCheckpointStore>) {
        let store = Arc::new(MemoryCheckpointStore::new());
        let graph = TripGraphBuilder::new(Arc::new(ScriptedLlm::new(script)), store.clone()).build();
        (TripPlanner::new(graph), store)
    }

    #[tokio::test]
    async fn empty_request_is_rejected() {
        let (planner, store) = planner(vec![]);
        let err = planner
            .plan(PlanRequest {
                user_input: Some("   ".into()),
                user_responses: Some(UserResponses::new()),
                thread_id: Some("t1".into()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::EmptyInput));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn generated_thread_id_is_echoed() {
        let (planner, store) = planner(vec![Ok(PARIS)]);
        let response = planner.plan(PlanRequest::new("5 days in Paris")).await.unwrap();
        assert!(Uuid::parse_str(&response.thread_id).is_ok());
        assert!(response.awaiting_answers);
        assert_eq!(response.missing_info, vec!["travel_start_date", "travel_end_date"]);
        assert!(store.load(&response.thread_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn answers_for_unknown_thread_start_fresh() {
        let (planner, _) = planner(vec![Ok(PARIS)]);
        let mut responses = UserResponses::new();
        responses.insert("destination".into(), "Paris".into());

        let response = planner
            .plan(PlanRequest::answers("ghost", responses))
            .await
            .unwrap();
        assert_eq!(response.thread_id, "ghost");
        assert_eq!(response.destination.as_deref(), Some("Paris"));
        assert!(response.awaiting_answers);
    }

    #[tokio::test]
    async fn answers_for_finished_thread_return_stored_result() {
        let (planner, store) = planner(vec![]);
        let finished = TripState {
            destination: Some("Paris".into()),
            status: TripStatus::NeedsClarification,
            clarification_loop_count: 2,
            clarifying_questions: Some(vec!["What date does your trip start?".into()]),
            ..Default::default()
        };
        store
            .save(&Checkpoint::terminal("t1", finished))
            .await
            .unwrap();

        let mut responses = UserResponses::new();
        responses.insert("travel_start_date".into(), "2024-06-01".into());
        let response = planner
            .plan(PlanRequest::answers("t1", responses))
            .await
            .unwrap();

        assert_eq!(response.status, TripStatus::NeedsClarification);
        assert!(!response.awaiting_answers);
        let saved = store.load("t1").await.unwrap().unwrap();
        assert!(!saved.is_suspended());
        assert_eq!(saved.state.clarification_loop_count, 2);
    }

    fn config(pairs: &[(&str, String)]) -> PlannerConfig {
        PlannerConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn from_config_wires_optional_flights() {
        let plain = config(&[("ANTHROPIC_API_KEY", "k".into())]);
        assert!(!TripPlanner::from_config(&plain).await.unwrap().flights_enabled());

        let with_flights = config(&[
            ("ANTHROPIC_API_KEY", "k".into()),
            ("SERPER_API_KEY", "s".into()),
        ]);
        assert!(TripPlanner::from_config(&with_flights).await.unwrap().flights_enabled());
    }

    #[tokio::test]
    async fn from_config_reports_unusable_database_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let bad_path = file.path().join("nested").join("trips.db");
        let cfg = config(&[
            ("ANTHROPIC_API_KEY", "k".into()),
            ("TRIP_PLANNER_DB_PATH", bad_path.display().to_string()),
        ]);

        let err = TripPlanner::from_config(&cfg).await.err().unwrap();
        assert!(matches!(err, crate::error::Error::Database(_)));
    }

    #[tokio::test]
    async fn discard_forgets_the_thread() {
        let (planner, store) = planner(vec![Ok(PARIS)]);
        let response = planner.plan(PlanRequest::new("Paris")).await.unwrap();

        assert!(planner.discard(&response.thread_id).await.unwrap());
        assert!(store.is_empty().await);
        assert!(!planner.discard(&response.thread_id).await.unwrap());
    }

    #[test]
    fn itinerary_falls_back_to_day_plan() {
        let day = serde_json::json!({"day": 1});
        let state = TripState {
            day_wise_plan: Some(vec![day.clone()]),
            ..Default::default()
        };
        let response = PlanResponse::from_state("t".into(), state);
        assert_eq!(response.itinerary, Some(vec![day]));
    }

    struct FixedFlights;

    #[async_trait]
    impl FlightSearch for FixedFlights {
        async fn search(&self, _: &str, origin: &str, arrival: &str) -> Result<String, ToolError> {
            Ok(format!("{origin} -> {arrival}: from $99"))
        }
    }

    #[tokio::test]
    async fn flight_lookup_requires_configuration() {
        let (planner, _) = planner(vec![]);
        let err = planner.flight_prices("pt", "Lisbon", "Paris").await.unwrap_err();
        assert!(matches!(err, RequestError::FlightsUnavailable));
        assert!(!planner.flights_enabled());

        let planner = planner.with_flights(Arc::new(FixedFlights));
        let text = planner.flight_prices("pt", "Lisbon", "Paris").await.unwrap();
        assert_eq!(text, "Lisbon -> Paris: from $99");
    }
}
