//! Term-frequency keyword retriever
//!
//! Scores a chunk by the summed occurrence counts of the query tokens in
//! its lower-cased text. No IDF weighting, no stemming; zero-score chunks
//! are excluded entirely.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::corpus::Chunk;
use crate::errors::Result;
use crate::retrieval::{read_corpus, sort_descending, RetrievalResult, Retriever, SharedCorpus};

/// Keyword retriever over the corpus store
pub struct KeywordRetriever {
    corpus: SharedCorpus,
}

impl KeywordRetriever {
    /// Create a retriever over the shared corpus
    pub fn new(corpus: SharedCorpus) -> Self {
        Self { corpus }
    }

    fn tokenize(query: &str) -> Vec<String> {
        query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect()
    }

    fn score(tokens: &[String], text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let lower = text.to_lowercase();
        tokens
            .iter()
            .map(|tok| lower.matches(tok.as_str()).count() as f64)
            .sum()
    }

    /// Exact-match conjunction over chunk metadata.
    ///
    /// The `region_tag` filter key matches the chunk's `region` field,
    /// case-insensitively. This naming quirk is load-bearing for callers
    /// that still send tag-style filters; keep it.
    fn passes_filters(chunk: &Chunk, filters: &HashMap<String, String>) -> bool {
        for (key, value) in filters {
            if key == "region_tag" {
                let region = chunk.metadata.get("region").map(String::as_str).unwrap_or("");
                if region.to_lowercase() != value.to_lowercase() {
                    return false;
                }
            } else if chunk.metadata.get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let tokens = Self::tokenize(query);
        let mut scored: Vec<RetrievalResult> = {
            let store = read_corpus(&self.corpus);
            store
                .chunks()
                .filter(|chunk| Self::passes_filters(chunk, filters))
                .filter_map(|chunk| {
                    let score = Self::score(&tokens, &chunk.text);
                    (score > 0.0).then(|| RetrievalResult {
                        chunk: chunk.clone(),
                        score,
                    })
                })
                .collect()
        };
        sort_descending(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }
}
