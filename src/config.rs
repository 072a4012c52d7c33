//! Configuration surface for the assistant.
//!
//! Defaults mirror the constants the service was tuned with; every knob that
//! the external interfaces accept per-call (chunk sizing, top-k, cache flag)
//! starts from the values here. Environment overrides are resolved inside the
//! constructor so call sites never touch `std::env` directly.

use std::path::PathBuf;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default number of retrieval results.
pub const DEFAULT_TOP_K: usize = 5;
/// Default cap on model/tool rounds within one turn.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 12;

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Default number of results returned by retrieval.
    pub top_k: usize,
    /// Name of the vector collection inside the store.
    pub collection_name: String,
    /// Path of the SQLite file backing the vector index and thread memory.
    pub storage_path: PathBuf,
    /// Directory for caching downloaded source documents.
    pub cache_dir: PathBuf,
    /// Whether URL downloads are cached on disk.
    pub enable_cache: bool,
    /// Thread id used when `ask` is called without one. All such callers
    /// share a single memory stream.
    pub default_thread_id: String,
    /// Cap on tool rounds per turn; `None` restores the unbounded loop.
    pub max_tool_rounds: Option<usize>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            collection_name: "ragpilot".to_string(),
            storage_path: PathBuf::from("ragpilot.db"),
            cache_dir: PathBuf::from(".ragpilot_cache"),
            enable_cache: true,
            default_thread_id: "default".to_string(),
            max_tool_rounds: Some(DEFAULT_MAX_TOOL_ROUNDS),
        }
    }
}

impl AssistantConfig {
    /// Builds a config from defaults with `RAGPILOT_*` environment overrides.
    ///
    /// Reads `.env` via dotenvy first, then the process environment. Values
    /// that fail to parse fall back to the default rather than erroring.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(value) = std::env::var("RAGPILOT_CHUNK_SIZE") {
            if let Ok(parsed) = value.parse() {
                config.chunk_size = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGPILOT_CHUNK_OVERLAP") {
            if let Ok(parsed) = value.parse() {
                config.chunk_overlap = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGPILOT_TOP_K") {
            if let Ok(parsed) = value.parse() {
                config.top_k = parsed;
            }
        }
        if let Ok(value) = std::env::var("RAGPILOT_COLLECTION") {
            config.collection_name = value;
        }
        if let Ok(value) = std::env::var("RAGPILOT_DB_PATH") {
            config.storage_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("RAGPILOT_CACHE_DIR") {
            config.cache_dir = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("RAGPILOT_ENABLE_CACHE") {
            config.enable_cache = value != "0" && !value.eq_ignore_ascii_case("false");
        }
        config
    }

    #[must_use]
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    #[must_use]
    pub fn with_default_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.default_thread_id = thread_id.into();
        self
    }

    #[must_use]
    pub fn with_max_tool_rounds(mut self, cap: Option<usize>) -> Self {
        self.max_tool_rounds = cap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = AssistantConfig::default();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(config.top_k, DEFAULT_TOP_K);
        assert_eq!(config.max_tool_rounds, Some(DEFAULT_MAX_TOOL_ROUNDS));
        assert!(config.enable_cache);
    }

    #[test]
    fn builder_methods_override_fields() {
        let config = AssistantConfig::default()
            .with_chunking(500, 50)
            .with_top_k(3)
            .with_collection_name("course_notes")
            .with_cache_enabled(false)
            .with_max_tool_rounds(None);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.collection_name, "course_notes");
        assert!(!config.enable_cache);
        assert_eq!(config.max_tool_rounds, None);
    }
}
