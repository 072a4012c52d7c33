//! Whitespace-aligned document chunking.
//!
//! Documents are split into segments of at most `chunk_size` characters with
//! `chunk_overlap` characters of overlap to the preceding segment of the same
//! document. Splits happen at whitespace only, never inside a token, so the
//! overlap is the largest whitespace-aligned suffix that fits the requested
//! budget (a single token longer than `chunk_size` is emitted whole).
//!
//! Chunk indices restart at 0 for each document, in the order documents were
//! supplied. Callers that need reproducible identifiers must sort their
//! documents (by source, then page) before calling in.

use tracing::{debug, warn};

use crate::errors::RagError;

use super::{Chunk, Document};

/// Splits `documents` into bounded, overlapping chunks.
///
/// Fails with [`RagError::InvalidParameters`] when `chunk_size` is zero or
/// the document list is empty. An overlap at or above `chunk_size` is clamped
/// to `chunk_size / 2` rather than rejected.
pub fn chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    mut chunk_overlap: usize,
) -> Result<Vec<Chunk>, RagError> {
    if documents.is_empty() {
        return Err(RagError::InvalidParameters(
            "cannot chunk an empty document list".to_string(),
        ));
    }
    if chunk_size == 0 {
        return Err(RagError::InvalidParameters(
            "chunk_size must be positive".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        let clamped = chunk_size / 2;
        warn!(
            chunk_overlap,
            chunk_size, clamped, "chunk_overlap >= chunk_size, clamping"
        );
        chunk_overlap = clamped;
    }

    let mut chunks = Vec::new();
    for document in documents {
        let segments = split_text(&document.text, chunk_size, chunk_overlap);
        for (chunk_index, text) in segments.into_iter().enumerate() {
            chunks.push(Chunk {
                source: document.source.clone(),
                page: document.page,
                chunk_index,
                text,
                metadata: document.metadata.clone(),
            });
        }
    }
    debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        chunk_size,
        chunk_overlap,
        "chunked documents"
    );
    Ok(chunks)
}

/// Splits one text into whitespace-aligned segments.
///
/// Greedy word packing: each segment takes as many whitespace-separated
/// tokens as fit in `chunk_size` characters (counting single joining spaces),
/// then the next segment starts from the longest token suffix of the previous
/// one whose length is at most `chunk_overlap`.
fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut start = 0usize;
    loop {
        let mut end = start;
        let mut length = 0usize;
        while end < words.len() {
            let word_length = words[end].chars().count();
            let projected = if length == 0 {
                word_length
            } else {
                length + 1 + word_length
            };
            if projected > chunk_size && length > 0 {
                break;
            }
            length = projected;
            end += 1;
        }

        segments.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }

        // Walk back whole words until the overlap budget is exhausted.
        let mut next_start = end;
        let mut overlap_length = 0usize;
        while next_start > start {
            let word_length = words[next_start - 1].chars().count();
            let projected = if overlap_length == 0 {
                word_length
            } else {
                overlap_length + 1 + word_length
            };
            if projected > chunk_overlap {
                break;
            }
            overlap_length = projected;
            next_start -= 1;
        }
        // Forward progress even when the whole segment fits in the overlap.
        if next_start <= start {
            next_start = start + 1;
        }
        start = next_start;
    }
    segments
}
