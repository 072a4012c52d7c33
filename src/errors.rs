//! Error taxonomies for the ingestion/retrieval side ([`RagError`]) and the
//! conversation side ([`AgentError`]).
//!
//! Ingestion and retrieval failures are recovered locally by the service layer
//! into `{ success: false, error }` responses so a batch of sources can keep
//! going past one failure. Conversation failures are caught at the outermost
//! boundary and degraded to an `Error: <cause>` answer instead of propagating.

use std::panic::Location;

use thiserror::Error;

/// Source position captured at the point an error was constructed.
///
/// [`RagError::IndexUnavailable`] carries one of these so that a storage
/// failure surfaced far from its origin still names the file and line that
/// raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Located {
    /// Captures the caller's location. `#[track_caller]` propagates through
    /// constructor helpers, so the recorded position is the real call site.
    #[track_caller]
    #[must_use]
    pub fn here() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl std::fmt::Display for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Errors produced by the ingestion pipeline, vector index, and retriever.
#[derive(Debug, Error)]
pub enum RagError {
    /// Bad chunking arguments, rejected before any I/O happens.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The requested source path or URL does not exist.
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// The source was reachable but yielded zero documents.
    #[error("no documents were loaded from '{source}'")]
    NoDocumentsLoaded { r#source: String },

    /// A retrieval query was blank.
    #[error("query cannot be empty")]
    EmptyQuery,

    /// The backing storage for the vector index is inaccessible.
    #[error("vector index unavailable ({location}): {message}")]
    IndexUnavailable { message: String, location: Located },

    /// The embedding provider failed or returned a malformed batch.
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Generic storage-layer failure (SQL, serialization of rows, ...).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl RagError {
    /// Builds an [`RagError::IndexUnavailable`] stamped with the caller's
    /// file and line.
    #[track_caller]
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        RagError::IndexUnavailable {
            message: message.into(),
            location: Located::here(),
        }
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

/// Errors produced by the conversation state machine and its memory store.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call itself failed. The service renders this to the end
    /// user as `Error: <cause>` text rather than crashing the thread.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Loading or saving a thread checkpoint failed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// The model kept requesting tools past the configured round cap.
    #[error("tool round limit of {limit} reached without a final answer")]
    ToolRoundLimit { limit: usize },

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_unavailable_records_call_site() {
        let err = RagError::index_unavailable("disk on fire");
        match err {
            RagError::IndexUnavailable { message, location } => {
                assert_eq!(message, "disk on fire");
                assert!(location.file.ends_with("errors.rs"));
                assert!(location.line > 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_includes_location() {
        let err = RagError::index_unavailable("nope");
        let rendered = err.to_string();
        assert!(rendered.contains("errors.rs"));
        assert!(rendered.contains("nope"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RagError = io.into();
        assert!(matches!(err, RagError::Io(_)));
    }
}
