//! Vector index with cosine-similarity search
//!
//! The in-memory store is the default; a remote-backed adapter with the same
//! external semantics lives in [`remote`]. Both apply metadata filters as an
//! exact-match conjunction and return at most `k` results, best first, with
//! ties broken by first-seen record order.

pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::errors::Result;

pub use remote::{vector_store_from_config, HttpSearchClient, OpenSearchVectorStore, SearchClient};

/// A stored vector with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

/// Which vector index backs the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorProvider {
    #[default]
    Memory,
    Opensearch,
}

/// Vector index contract: upsert plus filtered top-k cosine search.
///
/// An empty index, or a filter nothing passes, yields an empty list rather
/// than an error.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records positionally; a repeated id overwrites in
    /// place (last write wins).
    async fn upsert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[HashMap<String, String>],
    ) -> Result<()>;

    /// Top-k cosine search over records whose metadata contains every filter
    /// key with an equal value.
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<(VectorRecord, f32)>>;
}

/// Cosine similarity; mismatched or empty vectors score 0.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::MIN_POSITIVE);
    let nb = b.iter().map(|y| y * y).sum::<f32>().sqrt().max(f32::MIN_POSITIVE);
    dot / (na * nb)
}

pub(crate) fn passes_filter(
    metadata: &HashMap<String, String>,
    filter: &HashMap<String, String>,
) -> bool {
    filter
        .iter()
        .all(|(key, value)| metadata.get(key) == Some(value))
}

/// In-memory vector store.
///
/// Records keep insertion order behind a read-write lock; ingestion and
/// queries may therefore run from concurrent request handlers without
/// readers observing a partially updated index.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Records>,
}

#[derive(Debug, Default)]
struct Records {
    order: Vec<VectorRecord>,
    slots: HashMap<String, usize>,
}

impl InMemoryVectorStore {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    /// True when no records are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[HashMap<String, String>],
    ) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let records = &mut *guard;
        for ((id, vector), metadata) in ids.iter().zip(vectors).zip(metadatas) {
            let record = VectorRecord {
                id: id.clone(),
                vector: vector.clone(),
                metadata: metadata.clone(),
            };
            match records.slots.get(id).copied() {
                Some(slot) => records.order[slot] = record,
                None => {
                    let slot = records.order.len();
                    records.slots.insert(id.clone(), slot);
                    records.order.push(record);
                }
            }
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<(VectorRecord, f32)>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut results: Vec<(VectorRecord, f32)> = inner
            .order
            .iter()
            .filter(|record| passes_filter(&record.metadata, filter))
            .map(|record| (record.clone(), cosine(query, &record.vector)))
            .collect();
        // Stable sort keeps first-seen order on equal scores.
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    async fn seeded_store() -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                &["a".to_string(), "b".to_string(), "c".to_string()],
                &[
                    vec![1.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0],
                    vec![1.0, 1.0, 0.0],
                ],
                &[
                    meta(&[("crop", "tomato")]),
                    meta(&[("crop", "wheat")]),
                    meta(&[("crop", "tomato")]),
                ],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let store = InMemoryVectorStore::new();
        let out = store
            .similarity_search(&[1.0, 0.0], 5, &HashMap::new())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_by_cosine() {
        let store = seeded_store().await;
        let out = store
            .similarity_search(&[1.0, 0.0, 0.0], 2, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0.id, "a");
        assert!(out[0].1 > out[1].1);
    }

    #[tokio::test]
    async fn test_filter_is_exact_match_conjunction() {
        let store = seeded_store().await;
        let out = store
            .similarity_search(&[1.0, 1.0, 0.0], 5, &meta(&[("crop", "tomato")]))
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|(r, _)| r.metadata["crop"] == "tomato"));

        // Absent metadata key fails the filter.
        let none = store
            .similarity_search(&[1.0, 1.0, 0.0], 5, &meta(&[("region", "punjab")]))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_id_overwrites_in_place() {
        let store = seeded_store().await;
        store
            .upsert(
                &["a".to_string()],
                &[vec![0.0, 0.0, 1.0]],
                &[meta(&[("crop", "onion")])],
            )
            .await
            .unwrap();
        assert_eq!(store.len(), 3);
        let out = store
            .similarity_search(&[0.0, 0.0, 1.0], 1, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(out[0].0.id, "a");
        assert_eq!(out[0].0.metadata["crop"], "onion");
    }

    #[tokio::test]
    async fn test_ties_break_by_first_seen_order() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                &["first".to_string(), "second".to_string()],
                &[vec![1.0, 0.0], vec![1.0, 0.0]],
                &[HashMap::new(), HashMap::new()],
            )
            .await
            .unwrap();
        let out = store
            .similarity_search(&[1.0, 0.0], 2, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(out[0].0.id, "first");
        assert_eq!(out[1].0.id, "second");
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }
}
