//! Retrieval decorators
//!
//! Each wrapper holds an inner retriever of the same contract, over-fetches
//! from it, rescales scores, re-sorts and truncates to `k`. Wrappers nest in
//! any order; the over-fetch factors compound by design so a doubly wrapped
//! base sees a `k*4*2` window before the final truncation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::corpus::Chunk;
use crate::errors::Result;
use crate::retrieval::{sort_descending, RetrievalResult, Retriever};

/// Default freshness decay rate per day of age
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.05;

/// Default additive boost for authority-marked chunks
pub const DEFAULT_AUTHORITY_BOOST: f64 = 0.1;

/// Exponential freshness decay over the base retriever's scores.
///
/// `score' = score * exp(-lambda * age_days)` with age taken from the
/// chunk's `ingested_at` metadata. Pure re-ranking of the base output.
pub struct FreshnessRetriever {
    base: Arc<dyn Retriever>,
    decay_lambda_per_day: f64,
}

impl FreshnessRetriever {
    /// Wrap `base` with the given decay rate
    pub fn new(base: Arc<dyn Retriever>, decay_lambda_per_day: f64) -> Self {
        Self {
            base,
            decay_lambda_per_day,
        }
    }

    /// Wrap `base` with the default decay rate
    pub fn with_defaults(base: Arc<dyn Retriever>) -> Self {
        Self::new(base, DEFAULT_DECAY_LAMBDA)
    }

    /// Age in days; a missing or unparsable timestamp counts as fresh.
    fn age_days(chunk: &Chunk) -> f64 {
        let Some(stamp) = chunk.metadata.get("ingested_at") else {
            return 0.0;
        };
        let Ok(ingested) = DateTime::parse_from_rfc3339(stamp) else {
            return 0.0;
        };
        let age = Utc::now().signed_duration_since(ingested.with_timezone(&Utc));
        (age.num_seconds() as f64 / 86_400.0).max(0.0)
    }
}

#[async_trait]
impl Retriever for FreshnessRetriever {
    async fn retrieve(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let base_results = self.base.retrieve(query, filters, k * 4).await?;
        let mut rescored: Vec<RetrievalResult> = base_results
            .into_iter()
            .map(|r| {
                let factor = (-self.decay_lambda_per_day * Self::age_days(&r.chunk)).exp();
                RetrievalResult {
                    score: r.score * factor,
                    chunk: r.chunk,
                }
            })
            .collect();
        sort_descending(&mut rescored);
        rescored.truncate(k);
        Ok(rescored)
    }
}

/// Additive boost for chunks carrying a non-empty `authority` marker
pub struct AuthorityReranker {
    base: Arc<dyn Retriever>,
    authority_boost: f64,
}

impl AuthorityReranker {
    /// Wrap `base` with the given boost
    pub fn new(base: Arc<dyn Retriever>, authority_boost: f64) -> Self {
        Self {
            base,
            authority_boost,
        }
    }

    /// Wrap `base` with the default boost
    pub fn with_defaults(base: Arc<dyn Retriever>) -> Self {
        Self::new(base, DEFAULT_AUTHORITY_BOOST)
    }
}

#[async_trait]
impl Retriever for AuthorityReranker {
    async fn retrieve(
        &self,
        query: &str,
        filters: &HashMap<String, String>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let base_results = self.base.retrieve(query, filters, k * 2).await?;
        let mut reranked: Vec<RetrievalResult> = base_results
            .into_iter()
            .map(|r| {
                let authoritative = r
                    .chunk
                    .metadata
                    .get("authority")
                    .is_some_and(|a| !a.is_empty());
                let boost = if authoritative {
                    self.authority_boost
                } else {
                    0.0
                };
                RetrievalResult {
                    score: r.score + boost,
                    chunk: r.chunk,
                }
            })
            .collect();
        sort_descending(&mut reranked);
        reranked.truncate(k);
        Ok(reranked)
    }
}
