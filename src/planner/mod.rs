//! Trip-planning workflow: state, steps, graph and checkpoints.

pub mod checkpoint;
pub mod dates;
pub mod graph;
pub mod parser;
pub mod prompts;
pub mod questions;
pub mod service;
pub mod state;
pub mod steps;

pub use checkpoint::{Checkpoint, CheckpointStore, LibSqlCheckpointStore, MemoryCheckpointStore};
pub use graph::{RunOutcome, TripGraph, TripGraphBuilder};
pub use service::{PlanRequest, PlanResponse, TripPlanner};
pub use state::{StepName, TripState, TripStatus, TripUpdate, UserResponses};
pub use steps::SuspendPayload;
