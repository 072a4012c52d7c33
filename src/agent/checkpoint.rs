//! Per-thread conversation checkpointing.
//!
//! A checkpoint is the full message history of one thread, saved after each
//! completed turn. Threads whose turns never complete leave no checkpoint,
//! so a reload resumes from the last consistent state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::errors::AgentError;
use crate::message::Message;

/// The persisted state of one conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadCheckpoint {
    pub thread_id: String,
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadCheckpoint {
    #[must_use]
    pub fn new(thread_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages,
            updated_at: Utc::now(),
        }
    }
}

/// Storage seam for thread checkpoints.
#[async_trait]
pub trait ThreadCheckpointer: Send + Sync {
    /// Loads the checkpoint for `thread_id`, or `None` for an unseen thread.
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadCheckpoint>, AgentError>;

    /// Saves a checkpoint, replacing any previous one for the same thread.
    async fn save(&self, checkpoint: ThreadCheckpoint) -> Result<(), AgentError>;

    /// Ids of every thread with a checkpoint, sorted.
    async fn list_threads(&self) -> Result<Vec<String>, AgentError>;
}

/// Checkpointer that keeps everything in process memory. For tests and
/// ephemeral sessions.
#[derive(Clone, Default)]
pub struct InMemoryThreadStore {
    threads: Arc<Mutex<HashMap<String, ThreadCheckpoint>>>,
}

impl InMemoryThreadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadCheckpointer for InMemoryThreadStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadCheckpoint>, AgentError> {
        Ok(self.threads.lock().await.get(thread_id).cloned())
    }

    async fn save(&self, checkpoint: ThreadCheckpoint) -> Result<(), AgentError> {
        self.threads
            .lock()
            .await
            .insert(checkpoint.thread_id.clone(), checkpoint);
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>, AgentError> {
        let mut ids: Vec<String> = self.threads.lock().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Durable checkpointer on a local SQLite file.
///
/// Shares the database file with the vector store; the `threads` table is
/// independent of the vector schema.
#[derive(Clone)]
pub struct SqliteThreadStore {
    conn: Connection,
}

impl SqliteThreadStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS threads (
                    thread_id     TEXT PRIMARY KEY,
                    messages_json TEXT NOT NULL,
                    updated_at    TEXT NOT NULL
                );",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ThreadCheckpointer for SqliteThreadStore {
    async fn load(&self, thread_id: &str) -> Result<Option<ThreadCheckpoint>, AgentError> {
        let thread_id = thread_id.to_string();
        let row = self
            .conn
            .call(move |conn| {
                let result: Option<(String, String, String)> = conn
                    .query_row(
                        "SELECT thread_id, messages_json, updated_at \
                         FROM threads WHERE thread_id = ?1",
                        [&thread_id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(result)
            })
            .await
            .map_err(|err| AgentError::Checkpoint(err.to_string()))?;

        match row {
            None => Ok(None),
            Some((thread_id, messages_json, updated_at)) => {
                let messages: Vec<Message> = serde_json::from_str(&messages_json)?;
                let updated_at = updated_at
                    .parse::<DateTime<Utc>>()
                    .map_err(|err| AgentError::Checkpoint(err.to_string()))?;
                Ok(Some(ThreadCheckpoint {
                    thread_id,
                    messages,
                    updated_at,
                }))
            }
        }
    }

    async fn save(&self, checkpoint: ThreadCheckpoint) -> Result<(), AgentError> {
        let messages_json = serde_json::to_string(&checkpoint.messages)?;
        let thread_id = checkpoint.thread_id.clone();
        let updated_at = checkpoint.updated_at.to_rfc3339();
        debug!(thread_id, messages = checkpoint.messages.len(), "saving checkpoint");
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO threads (thread_id, messages_json, updated_at) \
                     VALUES (?1, ?2, ?3) \
                     ON CONFLICT (thread_id) DO UPDATE SET \
                     messages_json = excluded.messages_json, \
                     updated_at = excluded.updated_at",
                    (&thread_id, &messages_json, &updated_at),
                )
                .map(|_| ())
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| AgentError::Checkpoint(err.to_string()))
    }

    async fn list_threads(&self) -> Result<Vec<String>, AgentError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT thread_id FROM threads ORDER BY thread_id")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err| AgentError::Checkpoint(err.to_string()))
    }
}
