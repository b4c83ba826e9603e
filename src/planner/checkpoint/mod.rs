//! Checkpoint persistence keyed by thread id.
//!
//! The store keeps the latest snapshot per thread. A checkpoint written at
//! the suspend point records where to resume and the payload shown to the
//! caller; a terminal checkpoint has neither.

mod libsql_store;
mod memory;
mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::planner::state::{StepName, TripState};
use crate::planner::steps::SuspendPayload;

pub use libsql_store::LibSqlCheckpointStore;
pub use memory::MemoryCheckpointStore;

/// Snapshot of one thread's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub checkpoint_id: Uuid,
    pub state: TripState,
    /// Step the thread is suspended at, if any.
    pub resume_at: Option<StepName>,
    pub pending: Option<SuspendPayload>,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn suspended(
        thread_id: impl Into<String>,
        state: TripState,
        step: StepName,
        payload: SuspendPayload,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: Uuid::new_v4(),
            state,
            resume_at: Some(step),
            pending: Some(payload),
            created_at: Utc::now(),
        }
    }

    pub fn terminal(thread_id: impl Into<String>, state: TripState) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: Uuid::new_v4(),
            state,
            resume_at: None,
            pending: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.resume_at.is_some()
    }
}

/// Backend-agnostic checkpoint storage.
///
/// Each thread id is written only by the execution that owns it; stores
/// need atomic per-key reads and writes and nothing more.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Latest checkpoint for a thread.
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, DatabaseError>;

    /// Replace the thread's checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), DatabaseError>;

    /// Remove a thread's checkpoint. Returns whether one existed.
    async fn delete(&self, thread_id: &str) -> Result<bool, DatabaseError>;
}
