//! Corpus store and ingestion
//!
//! Documents are chunked at ingestion time and read-only afterwards from the
//! pipeline's perspective. Ids are derived deterministically so re-ingesting
//! the same text lands on the same record.

pub mod chunking;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

pub use chunking::chunk_text;

/// A source document with inherited metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// A bounded slice of a document, the unit of retrieval.
///
/// Metadata always carries `chunk_index` plus the document metadata
/// (`region`, `crop`, `source_url`, `ingested_at`) and optionally `authority`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
    pub metadata: HashMap<String, String>,
}

/// Deterministic 16-hex-char id over the given parts.
fn hash_id(parts: &[&str]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    for part in parts {
        hasher.write(part.as_bytes());
    }
    format!("{:016x}", hasher.finish())
}

/// Build chunk/document metadata from ingestion attributes.
///
/// Region and crop are lower-cased so filters match case-insensitively at
/// ingestion time; `ingested_at` is always stamped.
pub fn enrich_metadata(
    base: Option<&HashMap<String, String>>,
    attrs: &IngestAttributes,
    effective_date: Option<DateTime<Utc>>,
) -> HashMap<String, String> {
    let mut meta = base.cloned().unwrap_or_default();
    if let Some(region) = &attrs.region {
        meta.insert("region".to_string(), region.to_lowercase());
    }
    if let Some(crop) = &attrs.crop {
        meta.insert("crop".to_string(), crop.to_lowercase());
    }
    if let Some(authority) = &attrs.authority {
        meta.insert("authority".to_string(), authority.clone());
    }
    if let Some(source_url) = &attrs.source_url {
        meta.insert("source_url".to_string(), source_url.clone());
    }
    let stamp = effective_date.unwrap_or_else(Utc::now);
    meta.insert("ingested_at".to_string(), stamp.to_rfc3339());
    meta
}

/// Source attributes attached to an ingested text
#[derive(Debug, Clone, Default)]
pub struct IngestAttributes {
    pub region: Option<String>,
    pub crop: Option<String>,
    pub authority: Option<String>,
    pub source_url: Option<String>,
}

/// In-memory corpus store with deterministic upsert semantics.
///
/// Chunks keep first-seen order so downstream ranking ties are stable.
#[derive(Debug, Default)]
pub struct CorpusStore {
    docs: HashMap<String, Document>,
    chunks: Vec<Chunk>,
    chunk_slots: HashMap<String, usize>,
}

impl CorpusStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document; the id is derived from (text, source_url).
    pub fn upsert_document(&mut self, text: &str, metadata: HashMap<String, String>) -> Document {
        let source_url = metadata.get("source_url").map(String::as_str).unwrap_or("");
        let doc_id = hash_id(&[text, source_url]);
        let doc = Document {
            id: doc_id.clone(),
            text: text.to_string(),
            metadata,
        };
        self.docs.insert(doc_id, doc.clone());
        doc
    }

    /// Insert or replace the chunks for a document.
    ///
    /// Chunk ids derive from (doc_id, index, text prefix); a repeated id
    /// overwrites in place and keeps its original position.
    pub fn upsert_chunks(&mut self, doc: &Document, parts: &[String]) -> Vec<Chunk> {
        let mut out = Vec::with_capacity(parts.len());
        for (idx, part) in parts.iter().enumerate() {
            let prefix: String = part.chars().take(32).collect();
            let chunk_id = hash_id(&[&doc.id, &idx.to_string(), &prefix]);
            let mut meta = doc.metadata.clone();
            meta.insert("chunk_index".to_string(), idx.to_string());
            let chunk = Chunk {
                id: chunk_id.clone(),
                doc_id: doc.id.clone(),
                text: part.clone(),
                metadata: meta,
            };
            match self.chunk_slots.get(&chunk_id).copied() {
                Some(slot) => self.chunks[slot] = chunk.clone(),
                None => {
                    self.chunk_slots.insert(chunk_id, self.chunks.len());
                    self.chunks.push(chunk.clone());
                }
            }
            out.push(chunk);
        }
        out
    }

    /// Look up a chunk by id
    pub fn get_chunk(&self, id: &str) -> Option<&Chunk> {
        self.chunk_slots.get(id).map(|&slot| &self.chunks[slot])
    }

    /// Look up a document by id
    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.docs.get(id)
    }

    /// Iterate chunks in first-seen order
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Number of stored chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of stored documents
    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }
}

/// Chunking parameters for [`ingest_text`]
#[derive(Debug, Clone)]
pub struct IngestParams {
    pub attrs: IngestAttributes,
    pub effective_date: Option<DateTime<Utc>>,
    pub max_chars: usize,
    pub overlap: usize,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            attrs: IngestAttributes::default(),
            effective_date: None,
            max_chars: 800,
            overlap: 100,
        }
    }
}

/// Chunk a text and upsert document plus chunks into the store.
pub fn ingest_text(
    store: &mut CorpusStore,
    text: &str,
    params: &IngestParams,
) -> crate::errors::Result<(Document, Vec<Chunk>)> {
    let meta = enrich_metadata(None, &params.attrs, params.effective_date);
    let doc = store.upsert_document(text, meta);
    let parts = chunk_text(text, params.max_chars, params.overlap)?;
    let chunks = store.upsert_chunks(&doc, &parts);
    Ok((doc, chunks))
}
