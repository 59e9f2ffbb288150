//! Vector-similarity retriever
//!
//! Embeds the query once, delegates to the vector store, then resolves
//! record ids back to corpus chunks. Records that resolve to no chunk are
//! dropped silently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::Embeddings;
use crate::errors::Result;
use crate::retrieval::{read_corpus, RetrievalResult, Retriever, SharedCorpus};
use crate::vectorstore::VectorStore;

/// Retriever backed by an embedding provider and a vector index
pub struct EmbeddingRetriever {
    corpus: SharedCorpus,
    embeddings: Arc<dyn Embeddings>,
    vector_store: Arc<dyn VectorStore>,
}

impl EmbeddingRetriever {
    /// Create a retriever over an already-indexed corpus
    pub fn new(
        corpus: SharedCorpus,
        embeddings: Arc<dyn Embeddings>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            corpus,
            embeddings,
            vector_store,
        }
    }
}

#[async_trait]
impl Retriever for EmbeddingRetriever {
    async fn retrieve(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vector = self
            .embeddings
            .embed(&[query])
            .into_iter()
            .next()
            .unwrap_or_default();
        let hits = self
            .vector_store
            .similarity_search(&query_vector, k, filters)
            .await?;

        let store = read_corpus(&self.corpus);
        let mut out = Vec::with_capacity(hits.len());
        for (record, score) in hits {
            // Record id is expected to be a chunk id; fall back to the
            // chunk_id metadata field written at indexing time.
            let chunk = store.get_chunk(&record.id).or_else(|| {
                record
                    .metadata
                    .get("chunk_id")
                    .and_then(|cid| store.get_chunk(cid))
            });
            match chunk {
                Some(chunk) => out.push(RetrievalResult {
                    chunk: chunk.clone(),
                    score: score as f64,
                }),
                None => debug!(record_id = %record.id, "vector hit resolves to no chunk, dropped"),
            }
        }
        Ok(out)
    }
}

/// Embed every corpus chunk and upsert it into the vector store.
///
/// Metadata gains a `chunk_id` field so hits can be resolved back even when
/// the backing store rewrites ids. Returns the number of chunks indexed.
pub async fn index_corpus(
    corpus: &SharedCorpus,
    embeddings: &dyn Embeddings,
    vector_store: &dyn VectorStore,
) -> Result<usize> {
    let (ids, texts, metas) = {
        let store = read_corpus(corpus);
        let mut ids = Vec::with_capacity(store.chunk_count());
        let mut texts = Vec::with_capacity(store.chunk_count());
        let mut metas = Vec::with_capacity(store.chunk_count());
        for chunk in store.chunks() {
            ids.push(chunk.id.clone());
            texts.push(chunk.text.clone());
            let mut meta = chunk.metadata.clone();
            meta.insert("chunk_id".to_string(), chunk.id.clone());
            metas.push(meta);
        }
        (ids, texts, metas)
    };
    if ids.is_empty() {
        return Ok(0);
    }
    let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = embeddings.embed(&text_refs);
    vector_store.upsert(&ids, &vectors, &metas).await?;
    Ok(ids.len())
}
