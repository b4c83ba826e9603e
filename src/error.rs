//! Error types for the trip planner.

/// Failures while assembling a planner from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Checkpoint persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Completion service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Failures inside a single workflow step.
///
/// Steps convert these into an `error` status plus an entry in the
/// accumulated `errors` list; they never reach the graph driver.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("No user input provided")]
    MissingInput,

    #[error("{field} is required")]
    MissingField { field: String },

    #[error("No attractions available to create day-wise plan")]
    NoAttractions,

    #[error("could not decode model response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("completion service failed: {0}")]
    Completion(#[from] LlmError),
}

/// Workflow graph driver errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] DatabaseError),

    #[error("Thread {thread_id} has no suspended checkpoint to resume")]
    NotSuspended { thread_id: String },

    #[error("Step {step} is not registered in the graph")]
    UnknownStep { step: String },

    #[error("Recursion limit of {limit} steps reached without termination")]
    RecursionLimit { limit: usize },
}

/// Errors returned to callers of the planner service.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Please describe your trip: user_input is required to start a new plan")]
    EmptyInput,

    #[error("Flight lookup is not configured")]
    FlightsUnavailable,

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// External tool errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} requires authentication")]
    AuthRequired { name: String },

    #[error("Tool {name} execution failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Invalid parameters for tool {name}: {reason}")]
    InvalidParameters { name: String, reason: String },
}

/// Result type alias for the planner.
pub type Result<T> = std::result::Result<T, Error>;
