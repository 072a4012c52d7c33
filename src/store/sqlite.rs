//! SQLite vector store backed by the `sqlite-vec` extension.
//!
//! Records live in a single `records` table keyed by `(collection, id)`.
//! Embeddings are stored as JSON float arrays and compared with
//! `vec_distance_cosine` at query time; similarity is `1 - distance`.

use std::collections::HashSet;
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::{debug, info};

use crate::embeddings::EmbeddingProvider;
use crate::errors::RagError;

use super::{UpsertReport, VectorIndex, VectorRecord};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    collection  TEXT NOT NULL,
    id          TEXT NOT NULL,
    source      TEXT NOT NULL,
    page        INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    content     TEXT NOT NULL,
    metadata    TEXT NOT NULL,
    embedding   TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS idx_records_source ON records (collection, source);
";

/// Vector index on a local SQLite file, one logical collection per handle.
#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
    path: PathBuf,
}

impl SqliteVectorStore {
    /// Opens (creating if needed) the store at `path`.
    ///
    /// Any failure to reach a usable index — missing parent directory that
    /// cannot be created, an unopenable file, a SQLite build without the
    /// vector extension — surfaces as [`RagError::IndexUnavailable`].
    pub async fn open(
        path: impl AsRef<Path>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        register_sqlite_vec()?;

        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    RagError::index_unavailable(format!(
                        "cannot create store directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(&path).await.map_err(|err| {
            RagError::index_unavailable(format!("cannot open {}: {err}", path.display()))
        })?;
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            conn.execute_batch(SCHEMA)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::index_unavailable(format!("vector extension check: {err}")))?;

        let collection = collection.into();
        info!(path = %path.display(), collection, "opened vector store");
        Ok(Self {
            conn,
            collection,
            embedder,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embeds the content of each record that does not carry a vector yet.
    async fn embed_records(&self, records: &mut [VectorRecord]) -> Result<(), RagError> {
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(());
        }
        let inputs: Vec<String> = pending.iter().map(|&i| records[i].content.clone()).collect();
        let vectors = self.embedder.embed_batch(&inputs).await?;
        if vectors.len() != pending.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                pending.len(),
                vectors.len()
            )));
        }
        for (&i, vector) in pending.iter().zip(vectors) {
            records[i].embedding = Some(vector);
        }
        Ok(())
    }

    /// Writes a batch in one transaction, overwriting existing identifiers.
    async fn write_records(&self, records: Vec<VectorRecord>) -> Result<(), RagError> {
        if records.is_empty() {
            return Ok(());
        }
        let collection = self.collection.clone();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let embedding = record.embedding.ok_or_else(|| {
                RagError::Storage(format!("record {} has no embedding", record.id))
            })?;
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            rows.push((
                record.id,
                record.source,
                i64::from(record.page),
                record.chunk_index as i64,
                record.content,
                record.metadata.to_string(),
                embedding_json,
            ));
        }
        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                for (id, source, page, chunk_index, content, metadata, embedding) in rows {
                    tx.execute(
                        "INSERT INTO records \
                         (collection, id, source, page, chunk_index, content, metadata, embedding) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                         ON CONFLICT (collection, id) DO UPDATE SET \
                         source = excluded.source, page = excluded.page, \
                         chunk_index = excluded.chunk_index, content = excluded.content, \
                         metadata = excluded.metadata, embedding = excluded.embedding",
                        (
                            &collection,
                            &id,
                            &source,
                            page,
                            chunk_index,
                            &content,
                            &metadata,
                            &embedding,
                        ),
                    )
                    .map(|_| ())
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Metadata of an arbitrary stored record, for store diagnostics.
    pub async fn sample_metadata(&self) -> Result<Option<serde_json::Value>, RagError> {
        let collection = self.collection.clone();
        self.conn
            .call(move |conn| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT metadata FROM records WHERE collection = ?1 LIMIT 1",
                        [&collection],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(raw)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
            .map(|raw| raw.and_then(|s| serde_json::from_str(&s).ok()))
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorStore {
    async fn existing_ids(&self) -> Result<HashSet<String>, RagError> {
        let collection = self.collection.clone();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT id FROM records WHERE collection = ?1")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([&collection], |row| row.get::<_, String>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut ids = HashSet::new();
                for row in rows {
                    ids.insert(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn insert_new(&self, records: Vec<VectorRecord>) -> Result<usize, RagError> {
        let existing = self.existing_ids().await?;
        let mut fresh: Vec<VectorRecord> = records
            .into_iter()
            .filter(|record| !existing.contains(&record.id))
            .collect();
        if fresh.is_empty() {
            debug!(collection = %self.collection, "no new records to insert");
            return Ok(0);
        }
        self.embed_records(&mut fresh).await?;
        let inserted = fresh.len();
        // The unique key makes a concurrent writer's duplicates harmless;
        // the overwrite just rewrites identical provenance.
        self.write_records(fresh).await?;
        Ok(inserted)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<UpsertReport, RagError> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }
        let existing = self.existing_ids().await?;
        let updated = records
            .iter()
            .filter(|record| existing.contains(&record.id))
            .count();
        let added = records.len() - updated;
        let mut records = records;
        self.embed_records(&mut records).await?;
        self.write_records(records).await?;
        Ok(UpsertReport { added, updated })
    }

    async fn query(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(VectorRecord, f32)>, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        if k == 0 {
            return Err(RagError::InvalidParameters(
                "top_k must be positive".to_string(),
            ));
        }
        let query_vector = self.embedder.embed(query).await?;
        let embedding_json = serde_json::to_string(&query_vector)
            .map_err(|err| RagError::Storage(err.to_string()))?;
        let collection = self.collection.clone();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, source, page, chunk_index, content, metadata, \
                         vec_distance_cosine(vec_f32(embedding), vec_f32(?1)) AS distance \
                         FROM records WHERE collection = ?2 \
                         ORDER BY distance ASC \
                         LIMIT {k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map((&embedding_json, &collection), |row| {
                        let record = VectorRecord {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            page: row.get::<_, i64>(2)? as u32,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                            content: row.get(4)?,
                            metadata: row
                                .get::<_, String>(5)
                                .map(|s| serde_json::from_str(&s).unwrap_or_default())
                                .unwrap_or_default(),
                            embedding: None,
                        };
                        let distance: f32 = row.get(6)?;
                        Ok((record, 1.0 - distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn clear(&self) -> Result<usize, RagError> {
        let collection = self.collection.clone();
        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM records WHERE collection = ?1",
                        [&collection],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                conn.execute("DELETE FROM records WHERE collection = ?1", [&collection])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        let collection = self.collection.clone();
        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM records WHERE collection = ?1",
                        [&collection],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

fn register_sqlite_vec() -> Result<(), RagError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *const c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(|message| RagError::index_unavailable(message))
}
