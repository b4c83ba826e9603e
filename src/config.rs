//! Configuration types, read from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default sampling temperature for every model call.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on steps executed in one graph invocation.
pub const DEFAULT_RECURSION_LIMIT: usize = 50;

/// Default number of clarification rounds before the workflow stops asking.
pub const DEFAULT_CLARIFICATION_LIMIT: u32 = 2;

/// How attractions and the day plan are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanningMode {
    /// One model call returns attractions and the day plan together.
    #[default]
    Fused,
    /// Attractions first, then a second call for the day plan.
    Separate,
}

/// Knobs for the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphOptions {
    /// Clarification rounds allowed before the forced stop.
    pub loop_limit: u32,
    /// Maximum steps per invocation.
    pub recursion_limit: usize,
    pub temperature: f32,
    pub planning_mode: PlanningMode,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            loop_limit: DEFAULT_CLARIFICATION_LIMIT,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            temperature: DEFAULT_TEMPERATURE,
            planning_mode: PlanningMode::default(),
        }
    }
}

/// Everything the binary needs to assemble a planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub llm: LlmConfig,
    pub graph: GraphOptions,
    /// libSQL checkpoint file; checkpoints stay in memory when unset.
    pub db_path: Option<PathBuf>,
    /// Enables flight-price lookup.
    pub serper_api_key: Option<SecretString>,
    /// Directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("TRIP_PLANNER_LLM_BACKEND") {
            Some(value) => value.parse::<LlmBackend>()?,
            None => LlmBackend::Anthropic,
        };
        let api_key = var(backend.api_key_var())
            .ok_or_else(|| ConfigError::MissingEnvVar(backend.api_key_var().to_string()))?;
        let model = var("TRIP_PLANNER_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let graph = GraphOptions {
            loop_limit: parse_or(&var, "TRIP_PLANNER_CLARIFICATION_LIMIT", DEFAULT_CLARIFICATION_LIMIT)?,
            recursion_limit: parse_or(&var, "TRIP_PLANNER_RECURSION_LIMIT", DEFAULT_RECURSION_LIMIT)?,
            temperature: parse_or(&var, "TRIP_PLANNER_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            planning_mode: if parse_bool(&var, "TRIP_PLANNER_FUSED_PLANNING", true)? {
                PlanningMode::Fused
            } else {
                PlanningMode::Separate
            },
        };
        if graph.recursion_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TRIP_PLANNER_RECURSION_LIMIT".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            graph,
            db_path: var("TRIP_PLANNER_DB_PATH").map(PathBuf::from),
            serper_api_key: var("SERPER_API_KEY").map(SecretString::from),
            log_dir: var("TRIP_PLANNER_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        }),
    }
}

fn parse_bool(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = var(key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a boolean"),
        }),
    }
}
