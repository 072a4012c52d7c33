//! Content addressing for chunks.
//!
//! A chunk's identifier is a SHA-256 of its provenance tuple
//! `(source, page, chunk_index)` — deliberately not of its text. Two chunks
//! with the same provenance collide on the same identifier even when the
//! source text changed between runs: the identifier is the dedup key that
//! makes re-ingestion idempotent and upserts targetable.

use serde_json::json;
use sha2::{Digest, Sha256};

use super::Chunk;

/// Computes the deterministic identifier for a provenance tuple.
#[must_use]
pub fn chunk_id(source: &str, page: u32, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    // Separator byte keeps ("ab", 1) distinct from ("a", "b1")-style tuples.
    hasher.update([0u8]);
    hasher.update(page.to_le_bytes());
    hasher.update((chunk_index as u64).to_le_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Addresses a chunk: computes its identifier, records it in the chunk's
/// metadata under `"chunk_id"` for traceability, and returns it.
pub fn address_chunk(chunk: &mut Chunk) -> String {
    let id = chunk_id(&chunk.source, chunk.page, chunk.chunk_index);
    match &mut chunk.metadata {
        serde_json::Value::Object(map) => {
            map.insert("chunk_id".to_string(), json!(id));
        }
        other => {
            *other = json!({ "chunk_id": id });
        }
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_provenance_same_id() {
        assert_eq!(chunk_id("notes.txt", 2, 7), chunk_id("notes.txt", 2, 7));
    }

    #[test]
    fn id_ignores_text_content() {
        let mut a = Chunk {
            source: "notes.txt".to_string(),
            page: 0,
            chunk_index: 0,
            text: "first version".to_string(),
            metadata: json!({}),
        };
        let mut b = Chunk {
            text: "completely different text".to_string(),
            ..a.clone()
        };
        assert_eq!(address_chunk(&mut a), address_chunk(&mut b));
    }

    #[test]
    fn any_tuple_component_changes_the_id() {
        let base = chunk_id("notes.txt", 0, 0);
        assert_ne!(base, chunk_id("other.txt", 0, 0));
        assert_ne!(base, chunk_id("notes.txt", 1, 0));
        assert_ne!(base, chunk_id("notes.txt", 0, 1));
    }

    #[test]
    fn id_is_lowercase_hex_sha256() {
        let id = chunk_id("notes.txt", 0, 0);
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn addressing_records_id_in_metadata() {
        let mut chunk = Chunk {
            source: "notes.txt".to_string(),
            page: 3,
            chunk_index: 1,
            text: "body".to_string(),
            metadata: json!({"existing": true}),
        };
        let id = address_chunk(&mut chunk);
        assert_eq!(chunk.metadata["chunk_id"], json!(id));
        assert_eq!(chunk.metadata["existing"], json!(true));
    }

    #[test]
    fn addressing_replaces_non_object_metadata() {
        let mut chunk = Chunk {
            source: "notes.txt".to_string(),
            page: 0,
            chunk_index: 0,
            text: "body".to_string(),
            metadata: serde_json::Value::Null,
        };
        let id = address_chunk(&mut chunk);
        assert_eq!(chunk.metadata["chunk_id"], json!(id));
    }
}
