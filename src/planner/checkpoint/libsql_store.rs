//! libSQL-backed checkpoint store. Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::migrations;
use super::{Checkpoint, CheckpointStore};
use crate::error::DatabaseError;
use crate::planner::state::StepName;

/// Stores a single connection that is reused for all operations.
pub struct LibSqlCheckpointStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlCheckpointStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Checkpoint database opened");
        Ok(store)
    }

    /// Create an in-memory database.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(text).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn opt_text(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn row_to_checkpoint(row: &libsql::Row) -> Result<Checkpoint, DatabaseError> {
    let column = |e: libsql::Error| DatabaseError::Query(format!("checkpoint row parse: {e}"));

    let thread_id: String = row.get(0).map_err(column)?;
    let checkpoint_id: String = row.get(1).map_err(column)?;
    let state: String = row.get(2).map_err(column)?;
    let resume_at: Option<String> = row.get(3).map_err(column)?;
    let pending: Option<String> = row.get(4).map_err(column)?;
    let created_at: String = row.get(5).map_err(column)?;

    let resume_at = resume_at
        .map(|step| {
            serde_json::from_value::<StepName>(serde_json::Value::String(step))
                .map_err(|e| DatabaseError::Serialization(format!("resume_at: {e}")))
        })
        .transpose()?;

    Ok(Checkpoint {
        thread_id,
        checkpoint_id: Uuid::parse_str(&checkpoint_id)
            .map_err(|e| DatabaseError::Serialization(format!("checkpoint id: {e}")))?,
        state: from_json(&state)?,
        resume_at,
        pending: pending.as_deref().map(from_json).transpose()?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DatabaseError::Serialization(format!("created_at: {e}")))?,
    })
}

#[async_trait]
impl CheckpointStore for LibSqlCheckpointStore {
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT thread_id, checkpoint_id, state, resume_at, pending, created_at \
                 FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load checkpoint: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_checkpoint(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("load checkpoint: {e}"))),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), DatabaseError> {
        let pending = checkpoint.pending.as_ref().map(to_json).transpose()?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO checkpoints \
                 (thread_id, checkpoint_id, state, resume_at, pending, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    checkpoint.thread_id.clone(),
                    checkpoint.checkpoint_id.to_string(),
                    to_json(&checkpoint.state)?,
                    opt_text(checkpoint.resume_at.map(|s| s.as_str().to_string())),
                    opt_text(pending),
                    checkpoint.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save checkpoint: {e}")))?;

        debug!(
            thread_id = %checkpoint.thread_id,
            checkpoint_id = %checkpoint.checkpoint_id,
            suspended = checkpoint.is_suspended(),
            "Checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn
            .execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete checkpoint: {e}")))?;
        Ok(count > 0)
    }
}
