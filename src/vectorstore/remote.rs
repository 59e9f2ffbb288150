//! Remote-backed vector index
//!
//! The OpenSearch adapter talks through an injected [`SearchClient`] so the
//! wire layer stays mockable. External semantics match the in-memory store:
//! the filter conjunction is re-applied client-side and results truncate to
//! top-k, whichever backend answered.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{AdvisorError, Result};
use crate::vectorstore::{passes_filter, VectorProvider, VectorRecord, VectorStore};

/// Request timeout for the HTTP search backend
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Narrow search-backend contract: index one document, run one search.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Store `document` under `id` in `index`
    async fn index(&self, index: &str, id: &str, document: JsonValue) -> Result<()>;

    /// Execute a search request body and return the raw response
    async fn search(&self, index: &str, body: JsonValue) -> Result<JsonValue>;
}

/// reqwest-backed [`SearchClient`] speaking the OpenSearch REST protocol
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchClient {
    /// Create a client for the given OpenSearch base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn index(&self, index: &str, id: &str, document: JsonValue) -> Result<()> {
        let url = format!("{}/{}/_doc/{}", self.base_url, index, id);
        self.client
            .put(&url)
            .json(&document)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn search(&self, index: &str, body: JsonValue) -> Result<JsonValue> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Vector index backed by a remote search service
pub struct OpenSearchVectorStore {
    client: Arc<dyn SearchClient>,
    index: String,
    dim: usize,
}

impl OpenSearchVectorStore {
    /// Create a store over an injected client
    pub fn new(client: Arc<dyn SearchClient>, index: &str, dim: usize) -> Self {
        Self {
            client,
            index: index.to_string(),
            dim,
        }
    }

    fn record_from_hit(&self, hit: &JsonValue) -> Option<(VectorRecord, f32)> {
        let id = hit.get("_id")?.as_str()?.to_string();
        let score = hit.get("_score").and_then(JsonValue::as_f64).unwrap_or(0.0) as f32;
        let source = hit.get("_source").cloned().unwrap_or_else(|| json!({}));
        let vector = source
            .get("vector")
            .and_then(JsonValue::as_array)
            .map(|vals| {
                vals.iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect()
            })
            .unwrap_or_else(|| vec![0.0; self.dim]);
        let metadata = source
            .get("metadata")
            .and_then(JsonValue::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Some((
            VectorRecord {
                id,
                vector,
                metadata,
            },
            score,
        ))
    }
}

#[async_trait]
impl VectorStore for OpenSearchVectorStore {
    async fn upsert(
        &self,
        ids: &[String],
        vectors: &[Vec<f32>],
        metadatas: &[HashMap<String, String>],
    ) -> Result<()> {
        for ((id, vector), metadata) in ids.iter().zip(vectors).zip(metadatas) {
            let document = json!({ "vector": vector, "metadata": metadata });
            self.client.index(&self.index, id, document).await?;
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: &HashMap<String, String>,
    ) -> Result<Vec<(VectorRecord, f32)>> {
        let mut body = json!({
            "size": k,
            "query": {
                "knn": {
                    "field": "vector",
                    "query_vector": query,
                    "k": k,
                    "num_candidates": k.max(50),
                }
            },
        });
        if !filter.is_empty() {
            body["post_filter"] = json!({ "term": filter });
        }
        let response = self.client.search(&self.index, body).await?;
        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();

        let mut out: Vec<(VectorRecord, f32)> = hits
            .iter()
            .filter_map(|hit| self.record_from_hit(hit))
            .filter(|(record, _)| passes_filter(&record.metadata, filter))
            .collect();
        out.truncate(k);
        Ok(out)
    }
}

/// Build a vector store for the configured provider.
///
/// Selecting the remote provider without an injected client is a
/// configuration error, not a fallback to memory.
pub fn vector_store_from_config(
    provider: VectorProvider,
    client: Option<Arc<dyn SearchClient>>,
    index: &str,
    dim: usize,
) -> Result<Arc<dyn VectorStore>> {
    match provider {
        VectorProvider::Memory => Ok(Arc::new(super::InMemoryVectorStore::new())),
        VectorProvider::Opensearch => {
            let client = client.ok_or_else(|| {
                AdvisorError::Configuration(
                    "opensearch vector provider requires an injected search client".to_string(),
                )
            })?;
            Ok(Arc::new(OpenSearchVectorStore::new(client, index, dim)))
        }
    }
}
