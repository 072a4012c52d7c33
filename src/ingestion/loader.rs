//! Document loading with source-type detection and a download cache.
//!
//! Loading is a collaborator of the pipeline, not part of it: the pipeline
//! talks to [`DocumentLoader`] and never cares where pages come from.
//! [`TextDocumentLoader`] is the built-in implementation for plain-text and
//! markdown corpora; pages within a file are separated by form feeds
//! (`\x0C`), the traditional page-break character.
//!
//! URL sources download through [`DocumentCache`]: repeat ingestions of the
//! same URL read from disk instead of hitting the network.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::RagError;

use super::Document;

/// Form feed, the page separator inside a text document.
const PAGE_SEPARATOR: char = '\u{000C}';

/// File extensions the directory loader picks up.
const LOADABLE_EXTENSIONS: &[&str] = &["txt", "md", "text"];

/// How a source string should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Infer the type from the source string.
    Auto,
    File,
    Directory,
    Url,
}

impl SourceType {
    /// Infers the concrete type for a source string: an `http(s)` scheme
    /// prefix means URL, an existing directory means directory, anything
    /// else is treated as a file path.
    #[must_use]
    pub fn detect(source: &str) -> SourceType {
        if source.starts_with("http://") || source.starts_with("https://") {
            SourceType::Url
        } else if Path::new(source).is_dir() {
            SourceType::Directory
        } else {
            SourceType::File
        }
    }

    /// Resolves `Auto` against a concrete source string; concrete types pass
    /// through unchanged.
    #[must_use]
    pub fn resolve(self, source: &str) -> SourceType {
        match self {
            SourceType::Auto => Self::detect(source),
            other => other,
        }
    }
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Auto
    }
}

/// Cache statistics surfaced by the store-info endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub directory: String,
    pub files: usize,
    pub total_size_bytes: u64,
}

/// Filesystem cache for downloaded source documents.
///
/// Cache file names are derived from a hash of the URL plus its original
/// file name, so distinct URLs never collide and repeated runs are
/// deterministic.
#[derive(Clone, Debug)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the cache file path for a URL.
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        let digest = Sha256::digest(url.as_str().as_bytes());
        let prefix: String = digest
            .iter()
            .take(8)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        let original = Path::new(url.path())
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .map(sanitize_component)
            .unwrap_or_else(|| "document.txt".to_string());
        self.root.join(format!("{prefix}_{original}"))
    }

    /// Reports file count and total size of the cache directory.
    pub async fn stats(&self, enabled: bool) -> CacheStats {
        let mut files = 0usize;
        let mut total_size_bytes = 0u64;
        if let Ok(mut entries) = fs::read_dir(&self.root).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(meta) = entry.metadata().await {
                    if meta.is_file() {
                        files += 1;
                        total_size_bytes += meta.len();
                    }
                }
            }
        }
        CacheStats {
            enabled,
            directory: self.root.display().to_string(),
            files,
            total_size_bytes,
        }
    }

    /// Deletes all cached files, returning how many were removed.
    pub async fn clear(&self) -> Result<usize, RagError> {
        let mut deleted = 0usize;
        let Ok(mut entries) = fs::read_dir(&self.root).await else {
            return Ok(0);
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            match fs::remove_file(entry.path()).await {
                Ok(()) => deleted += 1,
                Err(err) => warn!(path = %entry.path().display(), %err, "failed to delete cached file"),
            }
        }
        info!(deleted, "cleared document cache");
        Ok(deleted)
    }
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Source-to-pages seam the ingestion pipeline talks to.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Loads documents from `source`, sorted by (source, page).
    ///
    /// `cache_override` of `Some` forces the download cache on or off for
    /// this call; `None` uses the loader's own setting. An empty result is
    /// legal here; the pipeline is responsible for reporting it as
    /// `NoDocumentsLoaded`.
    async fn load(
        &self,
        source: &str,
        source_type: SourceType,
        cache_override: Option<bool>,
    ) -> Result<Vec<Document>, RagError>;
}

/// Built-in loader for plain-text corpora (files, directories, URLs).
pub struct TextDocumentLoader {
    cache: DocumentCache,
    enable_cache: bool,
    client: reqwest::Client,
}

impl TextDocumentLoader {
    pub fn new(cache_dir: impl Into<PathBuf>, enable_cache: bool) -> Self {
        Self {
            cache: DocumentCache::new(cache_dir),
            enable_cache,
            client: reqwest::Client::new(),
        }
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn cache_enabled(&self) -> bool {
        self.enable_cache
    }

    async fn load_file(&self, file_path: &str) -> Result<Vec<Document>, RagError> {
        let path = Path::new(file_path);
        if !path.is_file() {
            return Err(RagError::SourceNotFound(file_path.to_string()));
        }
        let text = fs::read_to_string(path).await?;
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_path)
            .to_string();
        debug!(%source, "loaded file");
        Ok(paginate(&source, &text))
    }

    async fn load_directory(&self, directory: &str) -> Result<Vec<Document>, RagError> {
        let path = Path::new(directory);
        if !path.is_dir() {
            return Err(RagError::SourceNotFound(directory.to_string()));
        }
        let mut file_paths = Vec::new();
        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let loadable = entry_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| LOADABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if entry_path.is_file() && loadable {
                file_paths.push(entry_path);
            }
        }
        // Deterministic order so chunk identifiers reproduce across runs.
        file_paths.sort();

        let mut documents = Vec::new();
        for file_path in &file_paths {
            if let Some(as_str) = file_path.to_str() {
                documents.extend(self.load_file(as_str).await?);
            }
        }
        info!(
            directory,
            files = file_paths.len(),
            pages = documents.len(),
            "loaded directory"
        );
        Ok(documents)
    }

    async fn load_url(&self, raw_url: &str, use_cache: bool) -> Result<Vec<Document>, RagError> {
        let url = Url::parse(raw_url)
            .map_err(|err| RagError::SourceNotFound(format!("{raw_url}: {err}")))?;

        if use_cache {
            let cache_path = self.cache.cache_path(&url);
            if cache_path.exists() {
                debug!(%url, "loading document from cache");
                let text = fs::read_to_string(&cache_path).await?;
                return Ok(paginate(&source_name_for(&url), &text));
            }
        }

        info!(%url, "downloading document");
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let text = response.text().await?;

        if use_cache {
            let cache_path = self.cache.cache_path(&url);
            if let Some(parent) = cache_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&cache_path, &text).await?;
            debug!(path = %cache_path.display(), bytes = text.len(), "cached download");
        }

        Ok(paginate(&source_name_for(&url), &text))
    }
}

#[async_trait]
impl DocumentLoader for TextDocumentLoader {
    async fn load(
        &self,
        source: &str,
        source_type: SourceType,
        cache_override: Option<bool>,
    ) -> Result<Vec<Document>, RagError> {
        let resolved = source_type.resolve(source);
        let use_cache = cache_override.unwrap_or(self.enable_cache);
        let mut documents = match resolved {
            SourceType::File => self.load_file(source).await?,
            SourceType::Directory => self.load_directory(source).await?,
            SourceType::Url => self.load_url(source, use_cache).await?,
            SourceType::Auto => unreachable!("resolve() never returns Auto"),
        };
        documents.sort_by(|a, b| (a.source.as_str(), a.page).cmp(&(b.source.as_str(), b.page)));
        Ok(documents)
    }
}

/// Splits raw text into page documents at form-feed boundaries.
///
/// Blank pages are dropped; page numbers count the surviving pages from 0.
fn paginate(source: &str, text: &str) -> Vec<Document> {
    text.split(PAGE_SEPARATOR)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .enumerate()
        .map(|(page, page_text)| Document {
            source: source.to_string(),
            page: page as u32,
            text: page_text.to_string(),
            metadata: serde_json::json!({}),
        })
        .collect()
}

fn source_name_for(url: &Url) -> String {
    Path::new(url.path())
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| url.as_str().to_string())
}
