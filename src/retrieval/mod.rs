//! Composable retrieval strategies
//!
//! Every strategy implements the one [`Retriever`] contract: ranked results,
//! highest score first, at most `k` of them. Scores are strategy-specific
//! and not comparable across strategies. Decorators in [`wrappers`] stack
//! over any base retriever.

pub mod embedding;
pub mod keyword;
pub mod wrappers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::corpus::{Chunk, CorpusStore};
use crate::embedding::Embeddings;
use crate::errors::Result;
use crate::vectorstore::VectorStore;

pub use embedding::{index_corpus, EmbeddingRetriever};
pub use keyword::KeywordRetriever;
pub use wrappers::{AuthorityReranker, FreshnessRetriever};

/// A retrieved chunk with its strategy-specific score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f64,
}

/// One retrieval contract for every strategy and decorator
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve up to `k` chunks matching `query` under `filters`
    async fn retrieve(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>>;
}

/// Which base strategy backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalProvider {
    #[default]
    Keyword,
    Embedding,
}

/// Retrieval stack configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base strategy
    pub provider: RetrievalProvider,
    /// Wrap the base with exponential freshness decay
    pub freshness_enabled: bool,
    /// Wrap the stack with the authority reranker
    pub reranker_enabled: bool,
    /// Freshness decay rate per day of chunk age
    pub decay_lambda_per_day: f64,
    /// Additive boost for chunks with authority metadata
    pub authority_boost: f64,
    /// Default result count when the caller does not specify one
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            provider: RetrievalProvider::Keyword,
            freshness_enabled: false,
            reranker_enabled: false,
            decay_lambda_per_day: wrappers::DEFAULT_DECAY_LAMBDA,
            authority_boost: wrappers::DEFAULT_AUTHORITY_BOOST,
            default_k: 4,
        }
    }
}

/// Shared handle to the corpus store.
///
/// Ingestion writes and query reads may come from different request
/// handlers, so access goes through a read-write lock.
pub type SharedCorpus = Arc<RwLock<CorpusStore>>;

pub(crate) fn read_corpus(corpus: &SharedCorpus) -> std::sync::RwLockReadGuard<'_, CorpusStore> {
    corpus.read().unwrap_or_else(PoisonError::into_inner)
}

/// Compose the configured retrieval stack.
///
/// Decorator order matches the serving wiring: freshness wraps the base,
/// the authority reranker wraps the result. Over-fetch factors compound.
pub fn build_retriever(
    config: &RetrievalConfig,
    corpus: SharedCorpus,
    embeddings: Arc<dyn Embeddings>,
    vector_store: Arc<dyn VectorStore>,
) -> Arc<dyn Retriever> {
    let mut retriever: Arc<dyn Retriever> = match config.provider {
        RetrievalProvider::Keyword => Arc::new(KeywordRetriever::new(corpus)),
        RetrievalProvider::Embedding => {
            Arc::new(EmbeddingRetriever::new(corpus, embeddings, vector_store))
        }
    };
    if config.freshness_enabled {
        retriever = Arc::new(FreshnessRetriever::new(
            retriever,
            config.decay_lambda_per_day,
        ));
    }
    if config.reranker_enabled {
        retriever = Arc::new(AuthorityReranker::new(retriever, config.authority_boost));
    }
    retriever
}

/// Sort results best-first; the sort is stable so equal scores keep the
/// order the base produced.
pub(crate) fn sort_descending(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
